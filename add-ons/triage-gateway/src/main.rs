//! Axum-based gateway for the support triage desk. Config-driven via CoreConfig.

mod backend;
mod handlers;
mod sessions;

use axum::http::Method;
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use std::path::Path as StdPath;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_core::{
    default_entries, AdminGate, AuthProvider, ConversationSession, CoreConfig, CredentialVerifier,
    KnowledgeBackend, KnowledgeStore, MemoryAuthProvider, MemoryKnowledgeBackend, MemoryRoleStore,
    PassphraseVerifier, RoleStore, SledKnowledgeBackend, SupportDesk, TriageError,
};

use crate::backend::{HostedAuthClient, HostedBackend, HostedRoleStore};
use crate::handlers::{admin, chat};
use crate::sessions::SessionRegistry;

const KNOWLEDGE_DIR: &str = "triage_knowledge";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Pre-flight check: config loads, knowledge storage opens and the port is free.
fn run_verify() -> Result<(), String> {
    let config = CoreConfig::load().map_err(|e| format!("Config load failed: {}", e))?;

    if config.persist_knowledge {
        let path = StdPath::new(&config.storage_path).join(KNOWLEDGE_DIR);
        print!("Checking {}... ", path.display());
        let store = SledKnowledgeBackend::open_path(&path)
            .map_err(|e| format!("{} LOCKED or inaccessible: {}", KNOWLEDGE_DIR, e))?;
        let count = store.count().map_err(|e| format!("{} unreadable: {}", KNOWLEDGE_DIR, e))?;
        drop(store);
        println!("OK ({} entries)", count);
    } else {
        println!("Knowledge persistence disabled (in-memory only)");
    }

    if config.admin_passphrase.is_empty() {
        println!("Admin passphrase not set: admin panel will stay locked");
    }

    let port = config.port;
    print!("Checking port {}... ", port);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    match std::net::TcpListener::bind(addr) {
        Ok(listener) => {
            drop(listener);
            println!("OK (available)");
        }
        Err(e) => return Err(format!("Port {} BLOCKED: {}", port, e)),
    }

    println!("\nSUCCESS: ready to start gateway.");
    Ok(())
}

fn open_knowledge_backend(config: &CoreConfig) -> Result<Arc<dyn KnowledgeBackend>, TriageError> {
    if config.persist_knowledge {
        let path = StdPath::new(&config.storage_path).join(KNOWLEDGE_DIR);
        Ok(Arc::new(SledKnowledgeBackend::open_path(path)?))
    } else {
        Ok(Arc::new(MemoryKnowledgeBackend::new()))
    }
}

/// Writes the stock entries into a backend that was never seeded and holds nothing. A backend
/// emptied by admins stays empty. Returns whether anything was written.
fn seed_defaults(backend: &dyn KnowledgeBackend) -> Result<bool, TriageError> {
    if backend.is_seeded()? {
        return Ok(false);
    }
    if !backend.load()?.is_empty() {
        backend.mark_seeded()?;
        return Ok(false);
    }
    for entry in default_entries() {
        backend.save(&entry)?;
    }
    backend.mark_seeded()?;
    Ok(true)
}

type Collaborators = (Arc<dyn AuthProvider>, Arc<dyn RoleStore>);

fn collaborators(config: &CoreConfig) -> Result<Collaborators, TriageError> {
    match config.backend_base_url() {
        Some(url) => {
            let hosted = HostedBackend::new(url, config.backend_api_key.as_deref().unwrap_or_default())?;
            tracing::info!(target: "triage::gateway", backend = ?hosted, "Using hosted auth backend");
            Ok((
                Arc::new(HostedAuthClient::new(hosted.clone())),
                Arc::new(HostedRoleStore::new(hosted)),
            ))
        }
        None => {
            tracing::info!(target: "triage::gateway", "No backend_url configured; admin accounts kept in memory");
            Ok((Arc::new(MemoryAuthProvider::new()), Arc::new(MemoryRoleStore::new())))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[triage-gateway] .env not loaded: {} (using system environment)", e);
    }

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--verify") {
        match run_verify() {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                eprintln!("PRE-FLIGHT FAILED: {}", e);
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(CoreConfig::load()?);
    let knowledge = open_knowledge_backend(&config)?;
    if config.seed_defaults {
        match seed_defaults(knowledge.as_ref()) {
            Ok(true) => tracing::info!(target: "triage::gateway", backend = knowledge.name(), "Knowledge base seeded with default entries"),
            Ok(false) => tracing::debug!(target: "triage::gateway", "Knowledge base already seeded"),
            Err(e) => tracing::warn!(target: "triage::gateway", error = %e, "Failed to seed knowledge base"),
        }
    }

    let verifier = PassphraseVerifier::new(config.admin_passphrase.clone());
    if !verifier.is_configured() {
        tracing::warn!(target: "triage::gateway", "admin_passphrase is empty; admin unlock is disabled");
    }
    let (auth, roles) = collaborators(&config)?;

    let app = build_app(AppState {
        config: Arc::clone(&config),
        sessions: Arc::new(SessionRegistry::new()),
        knowledge,
        verifier: Arc::new(verifier),
        auth,
        roles,
    });

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], config.port));
    tracing::info!("{} listening on {}", config.app_name, addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_app(state: AppState) -> Router {
    // CORS: allow Backend/API (8001-8099) and Frontend/UI (3001-3099) port ranges.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &axum::http::HeaderValue, _| {
            let s = origin.to_str().unwrap_or("");
            let port = s
                .rsplit(':')
                .next()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(0);
            (3001..=3099).contains(&port) || (8001..=8099).contains(&port)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
        .expose_headers(tower_http::cors::Any);

    Router::new()
        .route("/v1/status", get(status))
        .route("/api/v1/health", get(health))
        .route("/api/v1/sessions", post(chat::create_session))
        .route(
            "/api/v1/sessions/:id",
            get(chat::get_session).delete(chat::close_session),
        )
        .route("/api/v1/sessions/:id/messages", post(chat::post_message))
        .route("/api/v1/sessions/:id/human-support", post(chat::request_human_support))
        .route("/api/v1/sessions/:id/resume", post(chat::resume_automated))
        .route("/api/v1/sessions/:id/events", get(chat::events))
        .route("/api/v1/sessions/:id/topics", get(chat::topics))
        .route("/api/v1/sessions/:id/admin/unlock", post(admin::unlock))
        .route("/api/v1/sessions/:id/admin/lock", post(admin::lock))
        .route(
            "/api/v1/sessions/:id/admin/entries",
            get(admin::list_entries).post(admin::save_entry),
        )
        .route(
            "/api/v1/sessions/:id/admin/entries/:entry_id",
            axum::routing::delete(admin::delete_entry),
        )
        .route("/api/v1/admin/register", post(admin::register))
        .with_state(state)
        .layer(cors)
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<CoreConfig>,
    pub(crate) sessions: Arc<SessionRegistry>,
    pub(crate) knowledge: Arc<dyn KnowledgeBackend>,
    pub(crate) verifier: Arc<dyn CredentialVerifier>,
    pub(crate) auth: Arc<dyn AuthProvider>,
    pub(crate) roles: Arc<dyn RoleStore>,
}

impl AppState {
    /// A desk over the backend's current knowledge, a fresh transcript and a locked gate.
    pub(crate) fn open_desk(&self) -> Result<SupportDesk, TriageError> {
        let knowledge = KnowledgeStore::from_entries(self.knowledge.load()?);
        Ok(SupportDesk::new(
            knowledge,
            ConversationSession::with_greeting(self.config.greeting_text()),
            AdminGate::new(Arc::clone(&self.verifier)),
        ))
    }
}

/// GET /api/v1/health – liveness check for UI and scripts.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// GET /v1/status – app identity and knowledge backend summary.
async fn status(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let entries = state.knowledge.load().map(|e| e.len()).ok();
    axum::Json(serde_json::json!({
        "app_name": state.config.app_name,
        "port": state.config.port,
        "knowledge_backend": state.knowledge.name(),
        "knowledge_entries": entries,
        "open_sessions": state.sessions.len(),
        "reply_delay_ms": state.config.reply_delay_ms,
        "auth_provider": state.auth.name(),
    }))
}
