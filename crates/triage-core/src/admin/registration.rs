//! Admin self-registration: sign the account up with the auth collaborator, then mark it
//! as admin with the role collaborator. Either failure aborts the flow with the
//! collaborator's message; no desk state is involved.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};

/// Shortest accepted password, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Account returned by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of a sign-up call. `user` is `None` when the provider accepted the request but did
/// not return an account yet (e.g. pending email confirmation).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignUp {
    pub user: Option<AuthUser>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
}

/// Role assignment keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub user_id: String,
    pub role: Role,
}

/// Account creation on the hosted auth service.
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp>;
}

/// Role table on the hosted database; `upsert` replaces any record with the same `user_id`.
#[async_trait::async_trait]
pub trait RoleStore: Send + Sync {
    async fn upsert(&self, record: RoleRecord) -> Result<()>;
}

#[derive(Clone, Deserialize)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RegistrationRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(TriageError::Validation("a valid email address is required".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(TriageError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Account created and marked as admin.
    Registered(AuthUser),
    /// Sign-up accepted without an account yet; no role was written.
    PendingConfirmation,
}

/// Registers a new admin account.
pub async fn register_admin(
    request: &RegistrationRequest,
    auth: &dyn AuthProvider,
    roles: &dyn RoleStore,
) -> Result<RegistrationOutcome> {
    request.validate()?;
    let email = request.email.trim();

    let signed_up = auth.sign_up(email, &request.password).await.map_err(|e| {
        tracing::warn!(target: "triage::admin", provider = auth.name(), error = %e, "Admin sign-up failed");
        e
    })?;

    let Some(user) = signed_up.user else {
        tracing::info!(target: "triage::admin", provider = auth.name(), "Admin sign-up pending confirmation");
        return Ok(RegistrationOutcome::PendingConfirmation);
    };

    roles
        .upsert(RoleRecord {
            user_id: user.id.clone(),
            role: Role::Admin,
        })
        .await
        .map_err(|e| {
            tracing::warn!(target: "triage::admin", user_id = %user.id, error = %e, "Admin role assignment failed");
            e
        })?;

    tracing::info!(target: "triage::admin", user_id = %user.id, "Admin account registered");
    Ok(RegistrationOutcome::Registered(user))
}
