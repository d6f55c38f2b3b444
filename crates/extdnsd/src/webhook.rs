//! external-dns webhook protocol
//!
//! | Method | Path               | Operation                       |
//! |--------|--------------------|---------------------------------|
//! | GET    | `/`                | negotiate (domain filter)       |
//! | GET    | `/records`         | `Reconciler::records`           |
//! | POST   | `/records`         | `Reconciler::apply_changes`     |
//! | POST   | `/adjustendpoints` | `Reconciler::adjust_endpoints`  |
//!
//! Passes are serialised through a mutex: external-dns drives one pass at a
//! time and the provider must never see two passes interleave.
//!
//! Each pass runs in its own task and always finishes, even when the write
//! timeout answers 503 first or the caller goes away. Stopping between the
//! removal and addition phases would leave updated records deleted.

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use extdns_core::{Changes, DomainFilter, Endpoint, Reconciler};
use http_body_util::LengthLimitError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// Media type of every webhook request and response body
pub const MEDIA_TYPE: &str = "application/external.dns.webhook+json;version=1";

/// Largest request body accepted (change sets for large zones included)
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Server-side time limits
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Time allowed to receive a request body
    pub read: Duration,
    /// Time a handler waits for its pass before answering 503
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(60),
            write: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
struct WebhookState {
    reconciler: Arc<Mutex<Reconciler>>,
    /// Copy of the reconciler's filter, served without locking
    domain_filter: Arc<DomainFilter>,
    timeouts: Timeouts,
}

impl WebhookState {
    /// Spawn a pass and wait for it under the write timeout
    ///
    /// The spawned task takes the lock itself and is never cancelled: on
    /// timeout the handler answers 503 and the pass carries on.
    #[allow(clippy::result_large_err)]
    async fn run_pass<T, F, Fut>(&self, name: &'static str, pass: F) -> Result<T, Response>
    where
        F: FnOnce(Arc<Mutex<Reconciler>>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::spawn(pass(self.reconciler.clone()));

        match tokio::time::timeout(self.timeouts.write, task).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Webhook {} pass did not complete: {}", name, e);
                Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
            Err(_) => Err(timed_out(name)),
        }
    }
}

/// Build the webhook router around a reconciler
pub fn router(reconciler: Reconciler, timeouts: Timeouts) -> Router {
    let state = WebhookState {
        domain_filter: Arc::new(reconciler.domain_filter().clone()),
        reconciler: Arc::new(Mutex::new(reconciler)),
        timeouts,
    };

    Router::new()
        .route("/", get(negotiate))
        .route("/records", get(records).post(apply_changes))
        .route("/adjustendpoints", post(adjust_endpoints))
        .layer(middleware::from_fn_with_state(state.clone(), read_body_within))
        .with_state(state)
}

async fn negotiate(State(state): State<WebhookState>) -> Response {
    webhook_json(StatusCode::OK, state.domain_filter.as_ref())
}

async fn records(State(state): State<WebhookState>) -> Response {
    let listed = state
        .run_pass("records", |reconciler| async move {
            let reconciler = reconciler.lock().await;
            reconciler.records().await
        })
        .await;

    match listed {
        Ok(Ok(endpoints)) => webhook_json(StatusCode::OK, &endpoints),
        Ok(Err(e)) => {
            error!("Failed to list records: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(response) => response,
    }
}

async fn apply_changes(State(state): State<WebhookState>, body: Bytes) -> Response {
    let changes: Changes = match parse_body(&body) {
        Ok(changes) => changes,
        Err(response) => return response,
    };

    let applied = state
        .run_pass("apply changes", move |reconciler| async move {
            let reconciler = reconciler.lock().await;
            reconciler.apply_changes(changes.into()).await
        })
        .await;

    match applied {
        Ok(Ok(report)) => {
            if report.failed_count() > 0 {
                warn!(
                    "Applied changes with {} failed call(s) out of {}",
                    report.failed_count(),
                    report.outcomes.len()
                );
            }
            StatusCode::NO_CONTENT.into_response()
        }
        Ok(Err(e)) => {
            error!("Failed to apply changes: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(response) => response,
    }
}

async fn adjust_endpoints(State(state): State<WebhookState>, body: Bytes) -> Response {
    let endpoints: Vec<Endpoint> = match parse_body(&body) {
        Ok(endpoints) => endpoints,
        Err(response) => return response,
    };

    let adjusted = state
        .run_pass("adjust endpoints", move |reconciler| async move {
            let reconciler = reconciler.lock().await;
            reconciler.adjust_endpoints(endpoints).await
        })
        .await;

    match adjusted {
        Ok(Ok(adjustment)) => webhook_json(StatusCode::OK, &adjustment.endpoints),
        Ok(Err(e)) => {
            error!("Failed to adjust endpoints: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(response) => response,
    }
}

/// Buffer the request body under the read timeout and size cap
async fn read_body_within(State(state): State<WebhookState>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let declared = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if declared.is_some_and(|length| length > MAX_BODY_BYTES) {
        return too_large();
    }

    let bytes = match tokio::time::timeout(
        state.timeouts.read,
        axum::body::to_bytes(body, MAX_BODY_BYTES),
    )
    .await
    {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) if exceeds_limit(&e) => return too_large(),
        Ok(Err(e)) => {
            debug!("Rejected request body: {}", e);
            return (StatusCode::BAD_REQUEST, "unreadable request body").into_response();
        }
        Err(_) => {
            return (StatusCode::REQUEST_TIMEOUT, "timed out reading request body").into_response();
        }
    };

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

fn too_large() -> Response {
    debug!("Rejected request body over {} bytes", MAX_BODY_BYTES);
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("request body exceeds {} bytes", MAX_BODY_BYTES),
    )
        .into_response()
}

#[allow(clippy::result_large_err)]
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Malformed webhook request: {}", e);
        (StatusCode::BAD_REQUEST, format!("malformed request body: {}", e)).into_response()
    })
}

fn webhook_json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => (status, [(header::CONTENT_TYPE, MEDIA_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to encode webhook response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn timed_out(pass: &str) -> Response {
    warn!("Webhook {} pass exceeded the write timeout, still running", pass);
    (StatusCode::SERVICE_UNAVAILABLE, format!("{} timed out", pass)).into_response()
}
