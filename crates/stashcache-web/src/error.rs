//! The JSON error surface (§7): maps every sibling crate's error type to
//! an HTTP status plus `{message}` body. No session/login branches here
//! -- authentication is an external gateway's job (§9 Open Question
//! resolutions), so this crate only ever sees "did the request succeed".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use snafu::Snafu;
use stashcache_core::EntityKind;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("unknown entity kind {kind:?}"))]
    UnknownKind { kind: String },
    #[snafu(display("{kind} has no {relation} relation"))]
    NoSuchRelation { kind: EntityKind, relation: String },
    #[snafu(display("{kind} {id} not found"))]
    NotFound { kind: EntityKind, id: String },
    #[snafu(display("no instance registered with id {instance:?}"))]
    UnknownInstance { instance: String },
    #[snafu(transparent)]
    Query { source: stashcache_query::QueryError },
    #[snafu(transparent)]
    Sync { source: stashcache_sync::SyncError },
    #[snafu(transparent)]
    Exclusion { source: stashcache_exclusion::ExclusionError },
    #[snafu(transparent)]
    Db { source: stashcache_db::DbError },
    #[snafu(transparent)]
    Upstream { source: stashcache_upstream::UpstreamError },
    #[snafu(display("invalid request body: {message}"))]
    InvalidRequest { message: String },
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::warn!(err = %self, "request failed");
        }
        (status, Json(ErrorBody { message: self.to_string() })).into_response()
    }
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::UnknownKind { .. } | AppError::NoSuchRelation { .. } | AppError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::UnknownInstance { .. } | AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Query { source: stashcache_query::QueryError::UnknownField { .. } } => StatusCode::BAD_REQUEST,
        AppError::Sync { source: stashcache_sync::SyncError::AlreadySyncing } => StatusCode::CONFLICT,
        AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
