//! Dashboard HTTP surface.
//!
//! | Route                    | Purpose                                    |
//! |--------------------------|--------------------------------------------|
//! | `GET /api/counts`        | Item counts on both sides                  |
//! | `GET /api/cache`         | Snapshot cache status                      |
//! | `POST /api/cache/refresh`| Re-capture the snapshot from the source    |
//! | `DELETE /api/cache`      | Drop the snapshot                          |
//! | `GET /api/sync`          | The run currently holding the lock, if any |
//! | `POST /api/sync`         | Trigger a run (`SyncRequest` JSON body)    |
//! | `GET /api/sync/stream`   | Server-Sent Events of the run's progress   |
//!
//! Every route requires `?password=` to match the configured secret.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use marksync::CacheError;
use marksync::sync::{SyncError, SyncRequest, SyncService};
use serde::Deserialize;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Interval between SSE keep-alive comments.
const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    service: Arc<SyncService>,
    password: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: Arc<SyncService>, password: Option<String>) -> Self {
        Self {
            service,
            password: password.filter(|p| !p.is_empty()).map(Arc::from),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    password: Option<String>,
}

/// Handler failures, rendered as `{"error": ...}`.
#[derive(Debug)]
enum ServerError {
    Unauthorized,
    Sync(SyncError),
    Cache(CacheError),
}

impl From<SyncError> for ServerError {
    fn from(err: SyncError) -> Self {
        ServerError::Sync(err)
    }
}

impl From<CacheError> for ServerError {
    fn from(err: CacheError) -> Self {
        ServerError::Cache(err)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "invalid password".to_string())
            }
            ServerError::Sync(err) => (StatusCode::BAD_GATEWAY, err.to_string()),
            ServerError::Cache(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Build the dashboard router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/counts", get(counts))
        .route("/api/cache", get(cache_status).delete(clear_cache))
        .route("/api/cache/refresh", post(refresh_cache))
        .route("/api/sync", get(active_run).post(trigger_sync))
        .route("/api/sync/stream", get(sync_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_password,
        ))
        .with_state(state)
}

async fn require_password(
    State(state): State<AppState>,
    Query(auth): Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    if let Some(expected) = &state.password
        && auth.password.as_deref() != Some(expected.as_ref())
    {
        tracing::debug!(path = %request.uri().path(), "Rejected request with bad password");
        return Err(ServerError::Unauthorized);
    }
    Ok(next.run(request).await)
}

async fn counts(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.counts().await)
}

async fn cache_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.cache_status().await)
}

async fn refresh_cache(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let stats = state.service.refresh_cache().await?;
    Ok(Json(stats))
}

async fn clear_cache(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    state.service.clear_cache().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn active_run(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "running": state.service.active_run(),
    }))
}

async fn trigger_sync(
    State(state): State<AppState>,
    Json(request): Json<SyncRequest>,
) -> impl IntoResponse {
    let outcome = state.service.trigger(request);
    let status = if outcome.accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::CONFLICT
    };
    (status, Json(outcome))
}

async fn sync_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let viewer_id = Uuid::new_v4();
    let rx = state.service.broadcaster().subscribe(viewer_id);
    tracing::debug!(%viewer_id, "Viewer connected");

    let stream = ReceiverStream::new(rx).filter_map(|event| {
        match Event::default().event(event.event_type()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                tracing::warn!("Failed to encode event: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("keepalive"))
}
