//! Admin surface: the access gate in front of knowledge editing, and self-registration of
//! admin accounts against the hosted auth/database collaborators.

mod gate;
mod memory;
mod registration;

pub use gate::{AdminGate, CredentialVerifier, GateState, PassphraseVerifier};
pub use memory::{MemoryAuthProvider, MemoryRoleStore};
pub use registration::{
    register_admin, AuthProvider, AuthUser, RegistrationOutcome, RegistrationRequest, Role, RoleRecord,
    RoleStore, SignUp, MIN_PASSWORD_LEN,
};
