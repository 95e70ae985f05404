//! Configuration loading, validation, and management for ForgeGate.
//!
//! Loads the gateway configuration from `forgegate.toml` with environment
//! variable overrides, and the source-of-truth policy file (see [`policy`]).
//! Both are read once at startup; there is no hot reload.

pub mod policy;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use policy::{PolicyFile, PrecedenceFileEntry};

/// Environment variable naming the app config file.
pub const CONFIG_ENV: &str = "FORGEGATE_CONFIG";
/// Environment variable overriding the audit HMAC secret.
pub const AUDIT_SECRET_ENV: &str = "FORGEGATE_AUDIT_SECRET";

/// The root configuration structure.
///
/// Maps directly to `forgegate.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SSOT policy file
    #[serde(default = "default_ssot_path")]
    pub ssot_path: PathBuf,

    /// HTTP listener and request limits
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Content-Security-Policy origins
    #[serde(default)]
    pub csp: CspConfig,

    /// Extra decoy endpoints
    #[serde(default)]
    pub honeypot: HoneypotConfig,

    /// Audit trail settings
    #[serde(default)]
    pub audit: AuditConfig,
}

fn default_ssot_path() -> PathBuf {
    PathBuf::from("ssot.toml")
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("ssot_path", &self.ssot_path)
            .field("gateway", &self.gateway)
            .field("csp", &self.csp)
            .field("honeypot", &self.honeypot)
            .field("audit", &self.audit)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Largest request body the gate will buffer for scanning.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CspConfig {
    /// Third-party origins allowed in `script-src`.
    #[serde(default = "default_script_origins")]
    pub script_origins: Vec<String>,

    /// Origins allowed in `connect-src`.
    #[serde(default = "default_connect_origins")]
    pub connect_origins: Vec<String>,
}

fn default_script_origins() -> Vec<String> {
    vec!["https://js.stripe.com".into()]
}
fn default_connect_origins() -> Vec<String> {
    vec![
        "https://*.supabase.co".into(),
        "https://api.stripe.com".into(),
    ]
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            script_origins: default_script_origins(),
            connect_origins: default_connect_origins(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoneypotConfig {
    /// Decoy paths appended to the built-in list.
    #[serde(default)]
    pub extra_paths: Vec<String>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Append-only JSONL audit file. `None` logs through tracing only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Key for the audit hash chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_secret: Option<String>,
}

impl std::fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditConfig")
            .field("log_path", &self.log_path)
            .field("hmac_secret", &redact(&self.hmac_secret))
            .finish()
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl AppConfig {
    /// Load configuration from `explicit`, else `$FORGEGATE_CONFIG`,
    /// else `./forgegate.toml`.
    ///
    /// Environment overrides (highest priority):
    /// - `FORGEGATE_SSOT`: SSOT file path
    /// - `FORGEGATE_AUDIT_SECRET`: audit chain key
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => std::env::var(CONFIG_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("forgegate.toml")),
        };
        let mut config = Self::load_from(&path)?;

        if let Ok(ssot) = std::env::var(policy::SSOT_ENV) {
            config.ssot_path = PathBuf::from(ssot);
        } else if config.ssot_path.is_relative()
            && let Some(parent) = path.parent()
        {
            // A relative SSOT path is relative to the config file.
            config.ssot_path = parent.join(&config.ssot_path);
        }

        if let Ok(secret) = std::env::var(AUDIT_SECRET_ENV) {
            config.audit.hmac_secret = Some(secret);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError("gateway.port must be > 0".into()));
        }

        if self.gateway.max_body_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_body_bytes must be > 0".into(),
            ));
        }

        // Origins are spliced into the CSP header verbatim.
        for origin in self.csp.script_origins.iter().chain(&self.csp.connect_origins) {
            if origin.is_empty()
                || origin.contains(';')
                || origin.contains('\'')
                || origin.contains(char::is_whitespace)
            {
                return Err(ConfigError::ValidationError(format!(
                    "invalid CSP origin '{origin}'"
                )));
            }
        }

        for decoy in &self.honeypot.extra_paths {
            if !decoy.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "honeypot path '{decoy}' must start with '/'"
                )));
            }
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ssot_path: default_ssot_path(),
            gateway: GatewayConfig::default(),
            csp: CspConfig::default(),
            honeypot: HoneypotConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
