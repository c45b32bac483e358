//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite database operations (users and tweets)
//! - Stored document models

mod database;
mod models;

pub use database::Database;
pub use models::*;
