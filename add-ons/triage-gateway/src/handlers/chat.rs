//! End-user chat: session lifecycle, message submission with delayed bot replies, human
//! handoff and the SSE transcript feed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use triage_core::{ChatMessage, SupportDesk};
use uuid::Uuid;

use super::{session, ApiError};
use crate::sessions::{SessionEvent, SessionSlot};
use crate::AppState;

/// Number of suggested topics shown next to the chat.
const TOPIC_COUNT: usize = 3;

fn snapshot(slot: &SessionSlot) -> serde_json::Value {
    slot.with_desk(|desk| {
        serde_json::json!({
            "session_id": slot.id(),
            "mode": desk.mode(),
            "transcript": desk.transcript(),
            "topics": desk.popular_topics(TOPIC_COUNT),
        })
    })
}

/// POST /api/v1/sessions – opens a desk with a fresh transcript and the current knowledge.
pub(crate) async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let desk: SupportDesk = state.open_desk()?;
    let slot = state.sessions.open(desk);
    Ok((StatusCode::CREATED, Json(snapshot(&slot))))
}

/// GET /api/v1/sessions/:id
pub(crate) async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let slot = session(&state, id)?;
    Ok(Json(snapshot(&slot)))
}

/// DELETE /api/v1/sessions/:id – drops the desk and cancels replies in flight.
pub(crate) async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.close(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

#[derive(Deserialize)]
pub(crate) struct MessageRequest {
    text: String,
    /// Wait for the delayed bot reply and return it in the response.
    #[serde(default)]
    await_reply: bool,
}

/// POST /api/v1/sessions/:id/messages
///
/// Blank text is accepted and ignored (`"accepted": false`).
pub(crate) async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MessageRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let slot = session(&state, id)?;

    let submitted = slot.with_desk(|desk| {
        let reply = desk.submit(&req.text)?;
        let user_message = desk.transcript().last().cloned()?;
        Some((user_message, reply))
    });
    let Some((user_message, reply)) = submitted else {
        return Ok((StatusCode::OK, Json(serde_json::json!({ "accepted": false }))));
    };

    tracing::info!(
        target: "triage::chat",
        session_id = %id,
        message_id = user_message.id,
        reply = ?reply.kind,
        "Message received"
    );
    slot.publish(SessionEvent::Message {
        message: user_message.clone(),
    });

    let kind = reply.kind.clone();
    let delivery = slot.schedule_reply(reply, state.config.reply_delay());

    if !req.await_reply {
        return Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "accepted": true,
                "message": user_message,
                "reply_kind": kind,
            })),
        ));
    }

    let reply: Option<ChatMessage> = delivery.await.ok();
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "accepted": true,
            "message": user_message,
            "reply_kind": kind,
            "reply": reply,
        })),
    ))
}

/// POST /api/v1/sessions/:id/human-support
pub(crate) async fn request_human_support(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let slot = session(&state, id)?;
    let (announcement, mode) = slot.with_desk(|desk| (desk.request_human_support(), desk.mode()));
    if let Some(message) = &announcement {
        slot.publish(SessionEvent::ModeChanged { mode });
        slot.publish(SessionEvent::Message {
            message: message.clone(),
        });
    }
    Ok(Json(serde_json::json!({
        "mode": mode,
        "changed": announcement.is_some(),
        "message": announcement,
    })))
}

/// POST /api/v1/sessions/:id/resume
pub(crate) async fn resume_automated(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let slot = session(&state, id)?;
    let (changed, mode) = slot.with_desk(|desk| (desk.resume_automated(), desk.mode()));
    if changed {
        slot.publish(SessionEvent::ModeChanged { mode });
    }
    Ok(Json(serde_json::json!({ "mode": mode, "changed": changed })))
}

/// GET /api/v1/sessions/:id/topics
pub(crate) async fn topics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let slot = session(&state, id)?;
    let topics = slot.with_desk(|desk| desk.popular_topics(TOPIC_COUNT));
    Ok(Json(serde_json::json!({ "topics": topics })))
}

/// GET /api/v1/sessions/:id/events – SSE feed of transcript appends and mode changes.
pub(crate) async fn events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl futures_util::Stream<Item = Result<Event, Infallible>> + Send + 'static>, ApiError> {
    use async_stream::stream;

    let slot = session(&state, id)?;
    let mut rx = slot.subscribe();
    let stream = stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let name = match &event {
                        SessionEvent::Message { .. } => "message",
                        SessionEvent::ModeChanged { .. } => "mode",
                    };
                    match Event::default().event(name).json_data(&event) {
                        Ok(ev) => yield Ok(ev),
                        Err(e) => tracing::warn!(target: "triage::chat", error = %e, "Dropping unserializable event"),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    yield Ok(Event::default().comment(format!("{} events dropped", n)));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
