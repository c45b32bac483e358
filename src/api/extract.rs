//! Extractors that reject with `AppError`
//!
//! axum's stock extractors answer bad input with plain-text bodies; these
//! wrappers route the rejection through `AppError` so every 4xx carries the
//! usual `{"error": ...}` JSON.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query string
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
