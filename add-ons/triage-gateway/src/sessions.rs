//! Per-client desks and their delayed bot replies.
//!
//! Each desk lives behind a std `Mutex` that is never held across `.await`. Every submitted
//! message gets its own reply task; the task's `AbortHandle` is kept until it fires so that
//! closing a session cancels replies still in flight. Overlapping delays deliver in
//! completion order.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::AbortHandle;
use triage_core::{ChatMessage, PendingReply, SessionMode, SupportDesk};
use uuid::Uuid;

const EVENT_BUFFER: usize = 64;

/// Pushed to SSE subscribers of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum SessionEvent {
    Message { message: ChatMessage },
    ModeChanged { mode: SessionMode },
}

pub(crate) struct SessionSlot {
    id: Uuid,
    desk: Mutex<SupportDesk>,
    events: broadcast::Sender<SessionEvent>,
    pending: Mutex<HashMap<u64, AbortHandle>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionSlot {
    fn new(id: Uuid, desk: SupportDesk) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            id,
            desk: Mutex::new(desk),
            events,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Runs `f` with exclusive access to the desk.
    pub(crate) fn with_desk<R>(&self, f: impl FnOnce(&mut SupportDesk) -> R) -> R {
        let mut desk = lock(&self.desk);
        f(&mut desk)
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub(crate) fn pending_replies(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Delivers `reply` after `delay`. The receiver resolves with the appended bot message,
    /// or is dropped if the session is closed first.
    pub(crate) fn schedule_reply(
        self: &Arc<Self>,
        reply: PendingReply,
        delay: Duration,
    ) -> oneshot::Receiver<ChatMessage> {
        let (tx, rx) = oneshot::channel();
        let key = reply.in_reply_to;
        let slot = Arc::clone(self);

        // Held until the handle is stored so the task cannot forget itself first.
        let mut pending = lock(&self.pending);
        let task = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let message = slot.with_desk(|desk| desk.deliver(reply));
            lock(&slot.pending).remove(&key);
            tracing::debug!(
                target: "triage::chat",
                session_id = %slot.id,
                in_reply_to = key,
                "Bot reply delivered"
            );
            slot.publish(SessionEvent::Message {
                message: message.clone(),
            });
            let _ = tx.send(message);
        });
        pending.insert(key, task.abort_handle());
        rx
    }

    fn cancel_pending(&self) -> usize {
        let mut pending = lock(&self.pending);
        let cancelled = pending.len();
        for (_, handle) in pending.drain() {
            handle.abort();
        }
        cancelled
    }
}

/// All open sessions of one gateway process.
#[derive(Default)]
pub(crate) struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<SessionSlot>>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open(&self, desk: SupportDesk) -> Arc<SessionSlot> {
        let id = Uuid::new_v4();
        let slot = Arc::new(SessionSlot::new(id, desk));
        self.sessions.insert(id, Arc::clone(&slot));
        tracing::info!(target: "triage::session", session_id = %id, open = self.sessions.len(), "Session opened");
        slot
    }

    pub(crate) fn get(&self, id: &Uuid) -> Option<Arc<SessionSlot>> {
        self.sessions.get(id).map(|s| Arc::clone(s.value()))
    }

    /// Removes the session and aborts its outstanding replies. Returns false for unknown ids.
    pub(crate) fn close(&self, id: &Uuid) -> bool {
        match self.sessions.remove(id) {
            Some((_, slot)) => {
                let cancelled = slot.cancel_pending();
                tracing::info!(
                    target: "triage::session",
                    session_id = %id,
                    cancelled_replies = cancelled,
                    "Session closed"
                );
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::{AdminGate, ConversationSession, KnowledgeStore, PassphraseVerifier, Sender};

    fn desk() -> SupportDesk {
        SupportDesk::new(
            KnowledgeStore::seeded(),
            ConversationSession::new(),
            AdminGate::new(Arc::new(PassphraseVerifier::new(""))),
        )
    }

    #[tokio::test]
    async fn scheduled_reply_is_appended_and_broadcast() {
        let registry = SessionRegistry::new();
        let slot = registry.open(desk());
        let mut events = slot.subscribe();

        let reply = slot.with_desk(|d| d.submit("¿Qué es iDempiere?")).unwrap();
        let message = slot.schedule_reply(reply, Duration::ZERO).await.unwrap();

        assert_eq!(message.sender, Sender::Bot);
        assert!(message.text.starts_with("iDempiere es un software ERP"));
        assert_eq!(slot.with_desk(|d| d.transcript().len()), 3);
        assert_eq!(slot.pending_replies(), 0);
        match events.recv().await.unwrap() {
            SessionEvent::Message { message: m } => assert_eq!(m, message),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn closing_a_session_cancels_pending_replies() {
        let registry = SessionRegistry::new();
        let slot = registry.open(desk());

        let reply = slot.with_desk(|d| d.submit("hola")).unwrap();
        let rx = slot.schedule_reply(reply, Duration::from_secs(60));
        assert_eq!(slot.pending_replies(), 1);

        assert!(registry.close(&slot.id()));
        assert!(rx.await.is_err());
        assert_eq!(slot.with_desk(|d| d.transcript().len()), 2);
        assert!(registry.get(&slot.id()).is_none());
        assert!(!registry.close(&slot.id()));
    }
}
