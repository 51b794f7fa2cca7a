//! Chat transcript types and the conversation state machine.

mod session;

use serde::{Deserialize, Serialize};

pub use session::ConversationSession;

/// First message of every transcript unless the desk is configured otherwise.
pub const DEFAULT_GREETING: &str =
    "¡Hola! Soy el asistente de soporte para iDempiere. ¿En qué puedo ayudarte hoy?";

/// Appended when the user asks for a human.
pub const HUMAN_SUPPORT_REQUESTED: &str =
    "Has solicitado soporte humano. Un agente se pondrá en contacto contigo pronto.";

/// Reply to every user message while a human has been requested.
pub const HUMAN_SUPPORT_ACK: &str =
    "Tu consulta ha sido registrada. Un agente humano se pondrá en contacto contigo pronto.";

/// Reply when no knowledge entry matches; offers escalation without changing state.
pub const NO_MATCH_OFFER: &str =
    "Lo siento, no tengo una respuesta específica para tu consulta. ¿Te gustaría solicitar ayuda de un agente humano?";

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Bot,
}

/// One transcript line. Transcript order is insertion order; `timestamp_ms` is for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique within the session; derived from creation time and strictly increasing.
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    pub timestamp_ms: i64,
}

/// Whether user input is answered by the matcher or absorbed while waiting for a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Automated,
    AwaitingHuman,
}

/// Why a bot reply says what it says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplyKind {
    /// A knowledge entry's answer, verbatim.
    Answer { entry_id: String },
    /// Nothing matched; escalation is offered.
    NoMatch,
    /// Human support was requested earlier; input is acknowledged, not matched.
    Acknowledgment,
}

/// A bot reply decided at submission time and appended later by [`ConversationSession::deliver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReply {
    /// Id of the user message being answered.
    pub in_reply_to: u64,
    pub text: String,
    pub kind: ReplyKind,
}
