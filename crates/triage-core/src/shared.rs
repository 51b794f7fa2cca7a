//! Configuration and small helpers shared by the core and the gateway.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::conversation::DEFAULT_GREETING;

/// Milliseconds since the Unix epoch (0 if the clock is before the epoch).
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Desk and gateway configuration. Load from TOML or env.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Display name of the desk (e.g. "Asistente de Soporte iDempiere").
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Base directory for the sled knowledge snapshot.
    pub storage_path: String,
    /// When true, admin edits are written through to sled under `storage_path`.
    #[serde(default)]
    pub persist_knowledge: bool,
    /// Secret checked by the admin gate. Empty disables admin unlock entirely.
    #[serde(default)]
    pub admin_passphrase: String,
    /// Delay before a bot reply is appended to the transcript.
    pub reply_delay_ms: u64,
    /// Greeting placed at the top of every new transcript.
    #[serde(default)]
    pub greeting: Option<String>,
    /// Base URL of the hosted auth/database backend. `None` keeps accounts in process.
    #[serde(default)]
    pub backend_url: Option<String>,
    /// Public API key sent to the hosted backend.
    #[serde(default)]
    pub backend_api_key: Option<String>,
    /// Seed an empty knowledge base with the stock entries on startup.
    #[serde(default = "default_true")]
    pub seed_defaults: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            app_name: "Support Triage Desk".to_string(),
            port: 8001,
            storage_path: "./data".to_string(),
            persist_knowledge: false,
            admin_passphrase: String::new(),
            reply_delay_ms: 500,
            greeting: None,
            backend_url: None,
            backend_api_key: None,
            seed_defaults: true,
        }
    }
}

impl CoreConfig {
    /// Bot "thinking" delay as a [`Duration`].
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    /// Configured greeting, falling back to the stock one when unset or blank.
    pub fn greeting_text(&self) -> &str {
        self.greeting
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_GREETING)
    }

    /// Hosted backend base URL without a trailing slash, if configured.
    pub fn backend_base_url(&self) -> Option<&str> {
        self.backend_url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .filter(|u| !u.is_empty())
    }

    /// Load config from file and environment. Precedence: env `TRIAGE__*` > file at
    /// `TRIAGE_CONFIG` (default `config/gateway`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("TRIAGE_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "Support Triage Desk")?
            .set_default("port", 8001_i64)?
            .set_default("storage_path", "./data")?
            .set_default("persist_knowledge", false)?
            .set_default("admin_passphrase", "")?
            .set_default("reply_delay_ms", 500_i64)?
            .set_default("seed_defaults", true)?;

        let path = Path::new(&config_path);
        let with_ext = path.with_extension("toml");
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else if with_ext.exists() {
            builder.add_source(config::File::from(with_ext.as_path()))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("TRIAGE").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_greeting_falls_back_to_stock_text() {
        let config = CoreConfig {
            greeting: Some("   ".to_string()),
            ..CoreConfig::default()
        };
        assert_eq!(config.greeting_text(), DEFAULT_GREETING);
    }

    #[test]
    fn backend_url_is_normalised() {
        let config = CoreConfig {
            backend_url: Some("https://example.supabase.co/".to_string()),
            ..CoreConfig::default()
        };
        assert_eq!(config.backend_base_url(), Some("https://example.supabase.co"));

        let empty = CoreConfig {
            backend_url: Some(String::new()),
            ..CoreConfig::default()
        };
        assert_eq!(empty.backend_base_url(), None);
    }

    #[test]
    fn reply_delay_defaults_to_half_a_second() {
        assert_eq!(CoreConfig::default().reply_delay(), Duration::from_millis(500));
    }
}
