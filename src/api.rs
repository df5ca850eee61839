//! HTTP API for worker clients.
//!
//! Thin translation layer: every handler authenticates through the
//! dispatcher and maps its typed errors onto status codes and the
//! `{success, ...}` JSON envelope the worker clients expect. Routes live
//! under `/apiv1`.

use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::model::{WorkId, WorkItem};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Query parameters carrying the shared access credential.
#[derive(Deserialize)]
struct CredentialQuery {
    credential: String,
}

/// Work item as handed to workers. `result_locator` is deliberately
/// omitted — workers produce results, they never read them back.
#[derive(Serialize)]
struct WorkItemResponse {
    id: Uuid,
    group_key: String,
    language: String,
    source_locator: String,
    cache_locator: String,
    status: String,
}

impl From<WorkItem> for WorkItemResponse {
    fn from(item: WorkItem) -> Self {
        Self {
            id: item.id.0,
            group_key: item.group_key,
            language: item.language,
            source_locator: item.source_locator,
            cache_locator: item.cache_locator,
            status: item.status.to_string(),
        }
    }
}

/// Response for `request_work`.
#[derive(Serialize)]
struct WorkResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    item: Option<WorkItemResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Generic API response.
#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Response for health check.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::AuthInvalid => StatusCode::UNAUTHORIZED,
        // Running out of work is a normal outcome for a busy pool, not a
        // protocol error; clients poll again later.
        Error::NoWorkAvailable => StatusCode::OK,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::AlreadyInProgress(_)
        | Error::AlreadyComplete(_)
        | Error::NotInProgress(_)
        | Error::InvalidTransition { .. } => StatusCode::CONFLICT,
        Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: Error) -> (StatusCode, Json<ApiResponse>) {
    (
        status_for(&err),
        Json(ApiResponse {
            success: false,
            error: Some(err.to_string()),
        }),
    )
}

/// Build the API router around a dispatcher.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/apiv1/work/{language}", get(request_work))
        .route("/apiv1/claim/{id}", get(confirm_claim))
        .route("/apiv1/result/{id}", post(submit_result))
        .route("/apiv1/cancel/{id}", get(cancel))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

/// Bind and serve until ctrl-c.
pub async fn serve(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let app = router(dispatcher);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "dispatcher listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn request_work(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(language): Path<String>,
    Query(auth): Query<CredentialQuery>,
) -> impl IntoResponse {
    match dispatcher.request_work(&language, &auth.credential).await {
        Ok(item) => (
            StatusCode::OK,
            Json(WorkResponse {
                success: true,
                item: Some(item.into()),
                error: None,
            }),
        ),
        Err(err) => (
            status_for(&err),
            Json(WorkResponse {
                success: false,
                item: None,
                error: Some(err.to_string()),
            }),
        ),
    }
}

async fn confirm_claim(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(id): Path<Uuid>,
    Query(auth): Query<CredentialQuery>,
) -> impl IntoResponse {
    match dispatcher.confirm_claim(WorkId(id), &auth.credential).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                error: None,
            }),
        ),
        Err(err) => failure(err),
    }
}

async fn submit_result(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(id): Path<Uuid>,
    Query(auth): Query<CredentialQuery>,
    body: Bytes,
) -> impl IntoResponse {
    match dispatcher
        .submit_result(WorkId(id), &auth.credential, &body)
        .await
    {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                error: None,
            }),
        ),
        Err(err) => failure(err),
    }
}

async fn cancel(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(id): Path<Uuid>,
    Query(auth): Query<CredentialQuery>,
) -> impl IntoResponse {
    match dispatcher.cancel(WorkId(id), &auth.credential).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                error: None,
            }),
        ),
        Err(err) => failure(err),
    }
}
