//! Liveness and readiness probes
//!
//! Both probes report 503 until the webhook listener is bound, and again
//! once shutdown has started.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;

/// Shared health and readiness flags
#[derive(Debug, Default)]
pub struct HealthStatus {
    healthy: AtomicBool,
    ready: AtomicBool,
}

impl HealthStatus {
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Build the probe router
pub fn router(status: Arc<HealthStatus>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(status)
}

async fn healthz(State(status): State<Arc<HealthStatus>>) -> (StatusCode, &'static str) {
    probe(status.is_healthy())
}

async fn readyz(State(status): State<Arc<HealthStatus>>) -> (StatusCode, &'static str) {
    probe(status.is_ready())
}

fn probe(ok: bool) -> (StatusCode, &'static str) {
    if ok {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn status_of(app: &Router, uri: &str) -> StatusCode {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn probes_follow_status_flags() {
        let status = Arc::new(HealthStatus::default());
        let app = router(status.clone());

        assert_eq!(status_of(&app, "/healthz").await, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(&app, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);

        status.set_healthy(true);
        assert_eq!(status_of(&app, "/healthz").await, StatusCode::OK);
        assert_eq!(status_of(&app, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);

        status.set_ready(true);
        assert_eq!(status_of(&app, "/readyz").await, StatusCode::OK);

        status.set_healthy(false);
        status.set_ready(false);
        assert_eq!(status_of(&app, "/healthz").await, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(&app, "/readyz").await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let app = router(Arc::new(HealthStatus::default()));
        assert_eq!(status_of(&app, "/metrics").await, StatusCode::NOT_FOUND);
    }
}
