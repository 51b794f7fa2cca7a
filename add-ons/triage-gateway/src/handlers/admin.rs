//! Admin panel: gate unlock/lock, knowledge editing and admin self-registration.
//!
//! Knowledge edits are written through the shared backend, so sessions opened afterwards
//! see them; sessions already open keep their own snapshot plus their own edits.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use triage_core::{register_admin, KnowledgeEntry, RegistrationOutcome, RegistrationRequest};
use uuid::Uuid;

use super::{session, ApiError};
use crate::AppState;

#[derive(Deserialize)]
pub(crate) struct UnlockRequest {
    secret: String,
}

/// POST /api/v1/sessions/:id/admin/unlock
pub(crate) async fn unlock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UnlockRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let slot = session(&state, id)?;
    let (ok, gate) = slot.with_desk(|desk| (desk.verify_admin(&req.secret), desk.gate_state()));
    if !ok {
        return Err(ApiError::InvalidSecret);
    }
    tracing::info!(target: "triage::admin", session_id = %id, "Admin panel unlocked");
    Ok(Json(serde_json::json!({ "gate": gate })))
}

/// POST /api/v1/sessions/:id/admin/lock
pub(crate) async fn lock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let slot = session(&state, id)?;
    let gate = slot.with_desk(|desk| {
        desk.lock_admin();
        desk.gate_state()
    });
    Ok(Json(serde_json::json!({ "gate": gate })))
}

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    term: Option<String>,
}

/// GET /api/v1/sessions/:id/admin/entries?term=
pub(crate) async fn list_entries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let slot = session(&state, id)?;
    let term = query.term.unwrap_or_default();
    let entries = slot.with_desk(|desk| desk.search_entries(&term))?;
    Ok(Json(serde_json::json!({
        "term": term,
        "count": entries.len(),
        "entries": entries,
    })))
}

/// POST /api/v1/sessions/:id/admin/entries – create (no id) or update (known id). Updating an
/// id the backend does not hold is a 404, nothing is written.
pub(crate) async fn save_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(entry): Json<KnowledgeEntry>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let slot = session(&state, id)?;
    let backend = state.knowledge.as_ref();
    let requested = entry.id().map(str::to_string);
    let saved = slot
        .with_desk(|desk| desk.save_entry(entry, Some(backend)))?
        .ok_or_else(|| ApiError::EntryNotFound(requested.unwrap_or_default()))?;
    tracing::info!(
        target: "triage::admin",
        session_id = %id,
        entry_id = saved.id().unwrap_or_default(),
        backend = backend.name(),
        "Knowledge entry saved"
    );
    Ok(Json(serde_json::json!({ "entry": saved })))
}

/// DELETE /api/v1/sessions/:id/admin/entries/:entry_id – unknown ids report `removed: false`.
pub(crate) async fn delete_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(Uuid, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let slot = session(&state, id)?;
    let backend = state.knowledge.as_ref();
    let removed = slot.with_desk(|desk| desk.remove_entry(&entry_id, Some(backend)))?;
    Ok(Json(serde_json::json!({ "id": entry_id, "removed": removed })))
}

/// POST /api/v1/admin/register
pub(crate) async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let outcome = register_admin(&req, state.auth.as_ref(), state.roles.as_ref()).await?;
    Ok(match outcome {
        RegistrationOutcome::Registered(user) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "status": "registered", "user": user })),
        ),
        RegistrationOutcome::PendingConfirmation => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "status": "pending_confirmation" })),
        ),
    })
}
