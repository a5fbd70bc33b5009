//! HTTP surface: the document API, health, and the replication receiver.
//!
//! Every route sits behind bearer authentication. Errors surface as
//! `{"error":"<message>"}` with the status mapped from [`StoreError`];
//! anything internal collapses to a generic 500.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use meshdoc_engine::DocEngine;
use meshdoc_types::error::{InvalidPayloadSnafu, NotFoundSnafu, UnauthorizedSnafu};
use meshdoc_types::{ChangeOp, ChangeRecord, Document, StoreError};

use crate::replication::Replicator;
use crate::writes;

/// Maximum number of ids returned by the listing endpoint.
const LIST_LIMIT: usize = 1000;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    /// The document engine.
    pub engine: Arc<DocEngine>,
    /// The replication fan-out client.
    pub replicator: Arc<Replicator>,
    /// Accepted inbound bearer tokens.
    pub tokens: Arc<HashSet<String>>,
}

/// Assembles the full router with authentication applied to all routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/docs", get(list_docs).post(create_doc))
        .route("/api/docs/{id}", get(get_doc).delete(delete_doc))
        .route("/replicate", post(replicate))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer))
        .with_state(state)
}

/// HTTP-facing error wrapper around [`StoreError`].
pub struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
            StoreError::Conflict => StatusCode::CONFLICT,
            StoreError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            StoreError::Unauthorized => StatusCode::UNAUTHORIZED,
            StoreError::Storage { .. } | StoreError::Serialization { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error");
            "internal error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(json!({"error": message}))).into_response()
    }
}

/// Rejects requests whose `Authorization: Bearer <token>` is missing or
/// not in the accepted set.
async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| state.tokens.contains(token));

    if !authorized {
        return ApiError(UnauthorizedSnafu.build()).into_response();
    }
    next.run(request).await
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn list_docs(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let ids = state.engine.list_ids(LIST_LIMIT)?;
    Ok(Json(json!({"ids": ids})))
}

async fn create_doc(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let input = parse_document(&body)?;
    let saved = writes::create_or_update(&state.engine, &state.replicator, input).await?;
    Ok((StatusCode::CREATED, Json(saved.into_value())))
}

async fn get_doc(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.engine.get(&id).await? {
        Some(doc) => Ok(Json(doc.into_value())),
        None => Err(NotFoundSnafu { id }.build().into()),
    }
}

async fn delete_doc(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    writes::delete(&state.engine, &state.replicator, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The replication receiver: validates the change record and applies it
/// under the same per-`_id` lock local writes use.
async fn replicate(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let value = parse_json(&body)?;
    let change: ChangeRecord = serde_json::from_value(value).map_err(|e| {
        ApiError(InvalidPayloadSnafu { message: format!("invalid change record: {e}") }.build())
    })?;
    change.validate()?;

    match change.op {
        ChangeOp::Put => {
            let doc = change.doc.ok_or_else(|| {
                ApiError(InvalidPayloadSnafu { message: "put requires doc" }.build())
            })?;
            state.engine.apply_remote_put(doc, change.prev_rev.as_deref()).await?;
        },
        ChangeOp::Del => {
            state.engine.apply_remote_del(&change.id, change.prev_rev.as_deref()).await?;
        },
    }
    Ok(Json(json!({"ok": true})))
}

fn parse_json(body: &str) -> Result<Value, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        ApiError(InvalidPayloadSnafu { message: format!("body is not valid JSON: {e}") }.build())
    })
}

fn parse_document(body: &str) -> Result<Document, ApiError> {
    Ok(Document::from_value(parse_json(body)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: StoreError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_of(NotFoundSnafu { id: "x" }.build()), StatusCode::NOT_FOUND);
        assert_eq!(status_of(StoreError::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_of(InvalidPayloadSnafu { message: "m" }.build()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(UnauthorizedSnafu.build()), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_parse_document_rejects_non_objects() {
        assert!(parse_document("[1,2]").is_err());
        assert!(parse_document("{not json").is_err());
        assert!(parse_document("{\"a\":1}").is_ok());
    }
}
