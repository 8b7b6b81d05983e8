use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

mod rserve;

pub use rserve::{RSERVE_FAILING_COMMAND, RserveTestServer};

pub const PATH_OK: &str = "/ok";
pub const PATH_FAIL: &str = "/fail";
pub const PATH_SLOW: &str = "/slow";
pub const PATH_FLAKY: &str = "/flaky";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    saw_form_content_type: Arc<AtomicU64>,
    last_body: Arc<Mutex<Option<String>>>,
}

impl TestServerStats {
    fn observe(&self, headers: &HeaderMap, body: &Bytes) -> u64 {
        if headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("application/x-www-form-urlencoded"))
        {
            self.saw_form_content_type.fetch_add(1, Ordering::Relaxed);
        }
        let mut last = self
            .last_body
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(String::from_utf8_lossy(body).to_string());
        self.requests_total.fetch_add(1, Ordering::Relaxed)
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn saw_form_content_type(&self) -> u64 {
        self.saw_form_content_type.load(Ordering::Relaxed)
    }

    pub fn last_body(&self) -> Option<String> {
        self.last_body
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

async fn handle_ok(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    body: Bytes,
) -> &'static str {
    stats.observe(&headers, &body);
    "ok"
}

async fn handle_fail(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    stats.observe(&headers, &body);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn handle_slow(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    body: Bytes,
) -> &'static str {
    stats.observe(&headers, &body);
    sleep(Duration::from_millis(200)).await;
    "slow"
}

/// Every other request fails, starting with the first.
async fn handle_flaky(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if stats.observe(&headers, &body) % 2 == 0 {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_OK, post(handle_ok))
        .route(PATH_FAIL, post(handle_fail))
        .route(PATH_SLOW, post(handle_slow))
        .route(PATH_FLAKY, post(handle_flaky))
        .with_state(stats)
}

pub struct TestServer {
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
