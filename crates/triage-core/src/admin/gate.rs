//! Two-state admin gate.
//!
//! This decides which surface a desk exposes; it is not a security boundary. There is no
//! lockout, rate limiting or hashing.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Checks an admin secret.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, secret: &str) -> bool;
}

impl<F> CredentialVerifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn verify(&self, secret: &str) -> bool {
        self(secret)
    }
}

/// Compares against one configured passphrase. An empty passphrase accepts nothing.
#[derive(Clone)]
pub struct PassphraseVerifier {
    passphrase: String,
}

impl PassphraseVerifier {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }

    /// False when no passphrase is configured, i.e. the gate can never open.
    pub fn is_configured(&self) -> bool {
        !self.passphrase.is_empty()
    }
}

impl std::fmt::Debug for PassphraseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseVerifier")
            .field("configured", &self.is_configured())
            .finish()
    }
}

impl CredentialVerifier for PassphraseVerifier {
    fn verify(&self, secret: &str) -> bool {
        self.is_configured() && secret == self.passphrase
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    #[default]
    Locked,
    Unlocked,
}

/// Locked until a secret passes the verifier.
#[derive(Clone)]
pub struct AdminGate {
    state: GateState,
    verifier: Arc<dyn CredentialVerifier>,
}

impl AdminGate {
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self {
            state: GateState::Locked,
            verifier,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == GateState::Unlocked
    }

    /// Unlocks on success. A failed check leaves the state as it was and is indistinguishable
    /// from a wrong secret.
    pub fn verify(&mut self, secret: &str) -> bool {
        if self.verifier.verify(secret) {
            self.state = GateState::Unlocked;
            tracing::info!(target: "triage::admin", "Admin gate unlocked");
            true
        } else {
            tracing::warn!(target: "triage::admin", "Admin verification failed");
            false
        }
    }

    pub fn lock(&mut self) {
        self.state = GateState::Locked;
    }
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate").field("state", &self.state).finish()
    }
}
