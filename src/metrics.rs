//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("microblog_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "microblog_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Database Metrics
    pub static ref DB_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("microblog_db_queries_total", "Total number of database queries"),
        &["operation", "table"]
    ).expect("metric can be created");
    pub static ref DB_QUERY_DURATION_SECONDS: prometheus::HistogramVec = prometheus::HistogramVec::new(
        HistogramOpts::new(
            "microblog_db_query_duration_seconds",
            "Database query duration in seconds"
        ).buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["operation", "table"]
    ).expect("metric can be created");
    pub static ref DB_TIMEOUTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("microblog_db_timeouts_total", "Total number of database calls that hit their deadline"),
        &["operation"]
    ).expect("metric can be created");

    // Domain Metrics
    pub static ref TWEETS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "microblog_tweets_created_total",
        "Total number of tweets created"
    ).expect("metric can be created");
    pub static ref USERS_CREATED_TOTAL: IntCounter = IntCounter::new(
        "microblog_users_created_total",
        "Total number of users created"
    ).expect("metric can be created");
    pub static ref FOLLOW_GRAPH_CHANGES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("microblog_follow_graph_changes_total", "Follow/unfollow calls by outcome"),
        &["action", "outcome"]
    ).expect("metric can be created");
    pub static ref FOLLOWER_COUNTS_REPAIRED_TOTAL: IntCounter = IntCounter::new(
        "microblog_follower_counts_repaired_total",
        "Total number of follower counters corrected by reconciliation"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("microblog_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(DB_QUERIES_TOTAL.clone()))
        .expect("DB_QUERIES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(DB_QUERY_DURATION_SECONDS.clone()))
        .expect("DB_QUERY_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(DB_TIMEOUTS_TOTAL.clone()))
        .expect("DB_TIMEOUTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(TWEETS_CREATED_TOTAL.clone()))
        .expect("TWEETS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(USERS_CREATED_TOTAL.clone()))
        .expect("USERS_CREATED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(FOLLOW_GRAPH_CHANGES_TOTAL.clone()))
        .expect("FOLLOW_GRAPH_CHANGES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(FOLLOWER_COUNTS_REPAIRED_TOTAL.clone()))
        .expect("FOLLOWER_COUNTS_REPAIRED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

/// Record one HTTP request outcome.
pub fn observe_http(method: &str, endpoint: &str, status: u16) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, endpoint, &status.to_string()])
        .inc();
}
