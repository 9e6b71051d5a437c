//! Test helpers for the HTTP API tests.
//!
//! Each test gets its own in-memory database, blob directory and thumbnail runner.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::StatusCode;
use axum_test::TestServer;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use filevault::auth::{InMemorySessionStore, SessionManager};
use filevault::file::{BlobStore, FileService, LocalBlobStore};
use filevault::queue::{JobQueue, QueueMonitor, QueueRunner, RetryPolicy};
use filevault::thumbnail::{ThumbnailJob, ThumbnailWorker};
use filevault::web::{create_router, AppState};
use filevault::Database;

/// Header carrying the session token.
pub const X_TOKEN: HeaderName = HeaderName::from_static("x-token");

/// Upper bound for background work to finish in tests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A running application under test.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub monitor: QueueMonitor<ThumbnailJob>,
    runner: JoinHandle<()>,
    _blob_dir: TempDir,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.runner.abort();
    }
}

impl TestApp {
    /// Start an app with a one-hour session TTL.
    pub async fn spawn() -> Self {
        Self::with_session_ttl(Duration::from_secs(3600)).await
    }

    /// Start an app whose sessions expire after `ttl`.
    pub async fn with_session_ttl(ttl: Duration) -> Self {
        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        let blob_dir = TempDir::new().expect("Failed to create blob directory");
        let blobs: Arc<dyn BlobStore> = Arc::new(
            LocalBlobStore::new(blob_dir.path(), Duration::from_secs(5))
                .expect("Failed to create blob store"),
        );

        let (thumbnails, receiver) = JobQueue::<ThumbnailJob>::channel();
        let runner = QueueRunner::new(
            thumbnails.clone(),
            receiver,
            ThumbnailWorker::new(db.clone(), blobs.clone()),
        )
        .with_policy(RetryPolicy::new(
            3,
            Duration::from_millis(10),
            Duration::from_millis(50),
        ));
        let monitor = runner.monitor();
        let runner = runner.spawn();

        let sessions = SessionManager::new(Arc::new(InMemorySessionStore::new()), ttl, "auth_");
        let files = FileService::new(db.clone(), blobs, thumbnails);
        let state = Arc::new(AppState::new(db.clone(), sessions, files));

        let router = create_router(state, &[], 10 * 1024 * 1024);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            db,
            monitor,
            runner,
            _blob_dir: blob_dir,
        }
    }

    /// Register a user and return its id.
    pub async fn register(&self, email: &str, password: &str) -> i64 {
        let response = self
            .server
            .post("/users")
            .json(&json!({ "email": email, "password": password }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["id"]
            .as_i64()
            .expect("id should be a number")
    }

    /// Exchange credentials for a session token.
    pub async fn connect(&self, email: &str, password: &str) -> String {
        let response = self
            .server
            .get("/connect")
            .add_header(AUTHORIZATION, basic_auth(email, password))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"]
            .as_str()
            .expect("token should be a string")
            .to_string()
    }

    /// Register and connect in one step.
    pub async fn login(&self, email: &str) -> String {
        self.register(email, "pw").await;
        self.connect(email, "pw").await
    }

    /// Upload a record and return the response body.
    pub async fn upload(&self, token: &str, body: Value) -> Value {
        let response = self
            .server
            .post("/files")
            .add_header(X_TOKEN, token.to_string())
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()
    }
}

/// `Authorization: Basic` value for the given credentials.
pub fn basic_auth(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

/// Base64 encoding of `bytes`.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// A solid-colour PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Png)
        .expect("Failed to encode test image");
    out.into_inner()
}
