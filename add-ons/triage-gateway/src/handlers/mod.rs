//! HTTP handlers. `chat` serves the end-user conversation, `admin` the knowledge panel and
//! admin self-registration.

pub(crate) mod admin;
pub(crate) mod chat;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use triage_core::TriageError;
use uuid::Uuid;

use crate::sessions::SessionSlot;
use crate::AppState;

/// Error body: `{ "error": "...", "kind": "..." }`.
#[derive(Debug)]
pub(crate) enum ApiError {
    SessionNotFound(Uuid),
    EntryNotFound(String),
    InvalidSecret,
    Triage(TriageError),
}

impl From<TriageError> for ApiError {
    fn from(e: TriageError) -> Self {
        Self::Triage(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                "session_not_found",
                format!("session {} not found", id),
            ),
            Self::EntryNotFound(id) => (
                StatusCode::NOT_FOUND,
                "entry_not_found",
                format!("knowledge entry {} not found", id),
            ),
            Self::InvalidSecret => (
                StatusCode::UNAUTHORIZED,
                "invalid_secret",
                "admin verification failed".to_string(),
            ),
            Self::Triage(e) => {
                let status = match &e {
                    TriageError::Validation(_) => StatusCode::BAD_REQUEST,
                    TriageError::AdminLocked => StatusCode::UNAUTHORIZED,
                    TriageError::ExternalCall(_) | TriageError::Storage(_) => StatusCode::BAD_GATEWAY,
                };
                (status, e.kind(), e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message, "kind": kind }))).into_response()
    }
}

pub(crate) fn session(state: &AppState, id: Uuid) -> Result<Arc<SessionSlot>, ApiError> {
    state.sessions.get(&id).ok_or(ApiError::SessionNotFound(id))
}
