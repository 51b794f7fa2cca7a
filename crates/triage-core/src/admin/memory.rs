//! In-process auth and role collaborators, used when no hosted backend is configured.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::registration::{AuthProvider, AuthUser, Role, RoleRecord, RoleStore, SignUp};
use crate::error::{Result, TriageError};

/// Accounts keyed by lowercased email. Passwords are not kept.
#[derive(Debug, Default)]
pub struct MemoryAuthProvider {
    accounts: DashMap<String, AuthUser>,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

#[async_trait::async_trait]
impl AuthProvider for MemoryAuthProvider {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn sign_up(&self, email: &str, _password: &str) -> Result<SignUp> {
        // Check and insert under one shard lock so concurrent sign-ups can't both win.
        match self.accounts.entry(email.to_lowercase()) {
            Entry::Occupied(_) => Err(TriageError::ExternalCall("User already registered".to_string())),
            Entry::Vacant(slot) => {
                let user = AuthUser {
                    id: uuid::Uuid::new_v4().to_string(),
                    email: Some(email.to_string()),
                };
                slot.insert(user.clone());
                Ok(SignUp { user: Some(user) })
            }
        }
    }
}

/// Role records keyed by user id.
#[derive(Debug, Default)]
pub struct MemoryRoleStore {
    roles: DashMap<String, Role>,
}

impl MemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role_of(&self, user_id: &str) -> Option<Role> {
        self.roles.get(user_id).map(|r| *r.value())
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[async_trait::async_trait]
impl RoleStore for MemoryRoleStore {
    async fn upsert(&self, record: RoleRecord) -> Result<()> {
        self.roles.insert(record.user_id, record.role);
        Ok(())
    }
}
