//! Common test utilities for E2E tests

#![allow(dead_code)]

use microblog::{AppState, config};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
            },
            database: config::DatabaseConfig {
                path: db_path,
                query_timeout_ms: 5000,
                max_connections: 4,
            },
            reconcile: config::ReconcileConfig::default(),
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = microblog::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Create a user through the API and return its id
    pub async fn create_user(&self, username: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/v1/users"))
            .json(&json!({
                "username": username,
                "email": format!("{username}@example.com"),
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201, "creating user {username}");

        let body: Value = response.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    /// Follow `target` as `actor`, asserting success
    pub async fn follow(&self, actor: &str, target: &str) {
        let response = self
            .client
            .post(self.url(&format!("/api/v1/users/{actor}/follow/{target}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    /// Post a tweet through the API and return the created tweet
    pub async fn post_tweet(&self, author: &str, content: &str) -> Value {
        let response = self
            .client
            .post(self.url("/api/v1/tweets"))
            .json(&json!({ "author_id": author, "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }

    /// GET a path and decode the JSON body alongside the status
    pub async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }
}
