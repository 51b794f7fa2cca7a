//! Conversation state machine.
//!
//! ```text
//!              request_human_support (+1 bot message)
//!   Automated ─────────────────────────────────────▶ AwaitingHuman
//!       ▲                                                 │
//!       └──────────────── resume_automated ───────────────┘
//! ```
//!
//! A submitted message is appended immediately and its reply is decided at the same moment
//! (against the knowledge snapshot of that moment), but the reply is only appended when the
//! caller hands it back to [`ConversationSession::deliver`]. When several replies are in
//! flight, the transcript shows them in delivery order.

use super::{
    ChatMessage, PendingReply, ReplyKind, Sender, SessionMode, DEFAULT_GREETING, HUMAN_SUPPORT_ACK,
    HUMAN_SUPPORT_REQUESTED, NO_MATCH_OFFER,
};
use crate::knowledge::{KnowledgeStore, Matcher};
use crate::shared::now_ms;

/// Append-only transcript plus the human-handoff flag.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    transcript: Vec<ChatMessage>,
    mode: SessionMode,
    last_id: u64,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationSession {
    /// Session in `Automated` mode, greeted with [`DEFAULT_GREETING`].
    pub fn new() -> Self {
        Self::with_greeting(DEFAULT_GREETING)
    }

    /// Session greeted with `greeting` (the stock greeting if blank).
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        let greeting = if greeting.trim().is_empty() {
            DEFAULT_GREETING.to_string()
        } else {
            greeting
        };
        let mut session = Self {
            transcript: Vec::new(),
            mode: SessionMode::Automated,
            last_id: 0,
        };
        session.append(Sender::Bot, greeting);
        session
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_awaiting_human(&self) -> bool {
        self.mode == SessionMode::AwaitingHuman
    }

    /// Appends the user's message and decides the bot reply.
    ///
    /// Blank input is ignored: nothing is appended and `None` is returned. While awaiting a
    /// human the matcher is not consulted.
    pub fn submit<M>(&mut self, text: &str, knowledge: &KnowledgeStore, matcher: &M) -> Option<PendingReply>
    where
        M: Matcher + ?Sized,
    {
        if text.trim().is_empty() {
            return None;
        }
        let in_reply_to = self.append(Sender::User, text).id;

        let reply = match self.mode {
            SessionMode::AwaitingHuman => PendingReply {
                in_reply_to,
                text: HUMAN_SUPPORT_ACK.to_string(),
                kind: ReplyKind::Acknowledgment,
            },
            SessionMode::Automated => match matcher.find_best_match(text, knowledge.entries()) {
                Some(entry) => PendingReply {
                    in_reply_to,
                    text: entry.answer.clone(),
                    kind: ReplyKind::Answer {
                        entry_id: entry.id().unwrap_or_default().to_string(),
                    },
                },
                None => PendingReply {
                    in_reply_to,
                    text: NO_MATCH_OFFER.to_string(),
                    kind: ReplyKind::NoMatch,
                },
            },
        };
        tracing::debug!(
            target: "triage::chat",
            message_id = in_reply_to,
            mode = ?self.mode,
            reply = ?reply.kind,
            "User message accepted"
        );
        Some(reply)
    }

    /// Appends a reply previously returned by [`submit`](Self::submit).
    pub fn deliver(&mut self, reply: PendingReply) -> &ChatMessage {
        self.append(Sender::Bot, reply.text)
    }

    /// [`submit`](Self::submit) followed by an immediate [`deliver`](Self::deliver).
    pub fn respond<M>(&mut self, text: &str, knowledge: &KnowledgeStore, matcher: &M) -> Option<&ChatMessage>
    where
        M: Matcher + ?Sized,
    {
        let reply = self.submit(text, knowledge, matcher)?;
        Some(self.deliver(reply))
    }

    /// `Automated → AwaitingHuman`, announcing the handoff. Already awaiting: no-op, `None`.
    pub fn request_human_support(&mut self) -> Option<&ChatMessage> {
        if self.is_awaiting_human() {
            return None;
        }
        self.mode = SessionMode::AwaitingHuman;
        tracing::info!(target: "triage::chat", "Human support requested");
        Some(self.append(Sender::Bot, HUMAN_SUPPORT_REQUESTED))
    }

    /// `AwaitingHuman → Automated`; appends nothing. Returns whether the mode changed.
    pub fn resume_automated(&mut self) -> bool {
        if !self.is_awaiting_human() {
            return false;
        }
        self.mode = SessionMode::Automated;
        tracing::info!(target: "triage::chat", "Automated assistance resumed");
        true
    }

    fn append(&mut self, sender: Sender, text: impl Into<String>) -> &ChatMessage {
        let timestamp_ms = now_ms();
        let candidate = u64::try_from(timestamp_ms).unwrap_or(0);
        let id = if candidate > self.last_id { candidate } else { self.last_id + 1 };
        self.last_id = id;
        self.transcript.push(ChatMessage {
            id,
            text: text.into(),
            sender,
            timestamp_ms,
        });
        &self.transcript[self.transcript.len() - 1]
    }
}
