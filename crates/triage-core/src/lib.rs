//! triage-core: the support desk's knowledge base, lexical matcher, chat state machine
//! and admin gate.
//!
//! Everything here is synchronous and single-owner; the gateway add-on decides how desks
//! are shared between requests and when delayed bot replies are delivered.

mod admin;
mod conversation;
mod desk;
mod error;
mod knowledge;
mod shared;

pub use shared::{now_ms, CoreConfig};

pub use error::{Result, TriageError};

pub use knowledge::{
    default_entries, find_best_match, KnowledgeBackend, KnowledgeEntry, KnowledgeStore, LexicalMatcher,
    Matcher, MemoryKnowledgeBackend, SledKnowledgeBackend, MIN_KEYWORD_LEN,
};

pub use conversation::{
    ChatMessage, ConversationSession, PendingReply, ReplyKind, Sender, SessionMode, DEFAULT_GREETING,
    HUMAN_SUPPORT_ACK, HUMAN_SUPPORT_REQUESTED, NO_MATCH_OFFER,
};

pub use admin::{
    register_admin, AdminGate, AuthProvider, AuthUser, CredentialVerifier, GateState, MemoryAuthProvider,
    MemoryRoleStore, PassphraseVerifier, RegistrationOutcome, RegistrationRequest, Role, RoleRecord,
    RoleStore, SignUp, MIN_PASSWORD_LEN,
};

pub use desk::SupportDesk;
