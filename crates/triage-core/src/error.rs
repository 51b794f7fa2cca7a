//! Error type shared by every desk operation.
//!
//! Unknown ids are not errors: deleting one is a no-op and saving one appends a new entry.

/// Failure of a single user-triggered desk operation. None of these are fatal; the caller
/// reports them and local state stays as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriageError {
    /// A required field was empty after trimming.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The auth/database collaborator refused or failed; carries its message verbatim.
    #[error("{0}")]
    ExternalCall(String),

    /// An admin-only operation was attempted while the gate is locked.
    #[error("admin access is locked")]
    AdminLocked,

    /// The knowledge persistence backend failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl TriageError {
    /// Stable machine-readable kind for API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::ExternalCall(_) => "external_call",
            Self::AdminLocked => "admin_locked",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<sled::Error> for TriageError {
    fn from(e: sled::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for TriageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TriageError>;
