//! Hosted auth and role adapters (GoTrue-style `/auth/v1/signup`, PostgREST-style
//! `/rest/v1/user_roles`). Failures come back as `ExternalCall` carrying the service's own
//! message.

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use std::time::Duration;
use triage_core::{AuthProvider, AuthUser, Result, RoleRecord, RoleStore, SignUp, TriageError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection details shared by both adapters.
#[derive(Clone)]
pub(crate) struct HostedBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HostedBackend {
    pub(crate) fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TriageError::ExternalCall(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "application/json")
    }
}

impl std::fmt::Debug for HostedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedBackend").field("base_url", &self.base_url).finish()
    }
}

fn transport_error(e: reqwest::Error) -> TriageError {
    TriageError::ExternalCall(e.to_string())
}

/// Best human-readable message from an error body, else the status line.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status))
}

async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(TriageError::ExternalCall(error_message(status, &body)))
}

/// Sign-up responses carry the account either under `user` or at the top level.
fn user_from_signup(body: &serde_json::Value) -> Option<AuthUser> {
    let candidate = body.get("user").filter(|u| !u.is_null()).unwrap_or(body);
    serde_json::from_value::<AuthUser>(candidate.clone()).ok()
}

#[derive(Debug, Clone)]
pub(crate) struct HostedAuthClient {
    backend: HostedBackend,
}

impl HostedAuthClient {
    pub(crate) fn new(backend: HostedBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AuthProvider for HostedAuthClient {
    fn name(&self) -> &str {
        "hosted"
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp> {
        let resp = self
            .backend
            .post("/auth/v1/signup")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport_error)?;
        let body: serde_json::Value = check(resp).await?.json().await.map_err(transport_error)?;
        Ok(SignUp {
            user: user_from_signup(&body),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HostedRoleStore {
    backend: HostedBackend,
}

impl HostedRoleStore {
    pub(crate) fn new(backend: HostedBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RoleStore for HostedRoleStore {
    async fn upsert(&self, record: RoleRecord) -> Result<()> {
        let resp = self
            .backend
            .post("/rest/v1/user_roles?on_conflict=user_id")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[record])
            .send()
            .await
            .map_err(transport_error)?;
        check(resp).await?;
        Ok(())
    }
}
