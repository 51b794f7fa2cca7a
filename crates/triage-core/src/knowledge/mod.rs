//! Admin-editable knowledge base: question/answer entries, the lexical matcher that
//! answers chat queries from them, and the backends that keep them between sessions.

mod matcher;
mod persist;
mod store;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use matcher::{find_best_match, LexicalMatcher, Matcher, MIN_KEYWORD_LEN};
pub use persist::{MemoryKnowledgeBackend, SledKnowledgeBackend};
pub use store::{default_entries, KnowledgeStore};

/// One question/answer pair.
///
/// `id` is `None` (or empty on the wire) for an unsaved draft; the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub question: String,
    pub answer: String,
}

impl KnowledgeEntry {
    /// Unsaved entry; the store will assign an id.
    pub fn draft(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: None,
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Entry with a known id (e.g. an edit of an existing one).
    pub fn with_id(id: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Non-empty id, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|s| !s.is_empty())
    }

    /// Case-insensitive substring test over question and answer.
    pub fn mentions(&self, lowered_term: &str) -> bool {
        self.question.to_lowercase().contains(lowered_term) || self.answer.to_lowercase().contains(lowered_term)
    }
}

/// Durable home for knowledge entries (the external persistence collaborator).
///
/// Desks load a snapshot from it when they are created and write admin edits through it.
pub trait KnowledgeBackend: Send + Sync {
    /// Short label for status output.
    fn name(&self) -> &str;

    /// All saved entries, in the order they were first saved.
    fn load(&self) -> Result<Vec<KnowledgeEntry>>;

    /// Inserts or replaces the entry with `entry.id`. Position of an existing entry is kept.
    fn save(&self, entry: &KnowledgeEntry) -> Result<()>;

    /// Removes the entry; unknown ids are a no-op.
    fn remove(&self, id: &str) -> Result<()>;

    /// Whether the stock entries were ever written here. Survives deleting every entry.
    fn is_seeded(&self) -> Result<bool>;

    fn mark_seeded(&self) -> Result<()>;
}
