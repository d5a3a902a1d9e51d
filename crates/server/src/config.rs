//! # Application Configuration
//!
//! This module defines the configuration structure for the `intake-server` and
//! provides the logic for loading it from an optional `config.yml` file and
//! environment variables.

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use intake::{
    constants::{DEFAULT_DB_FILE, DEFAULT_LOCATION},
    providers::notify::{EmailSettings, SmsSettings},
};
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use tracing::info;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates an explicitly requested configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The path to the SQLite database file. Loaded from `DB_URL` env var.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// Where `/fill-form/{token}` redirects to. Loaded from `FRONTEND_URL`.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    /// The public address of this server, used to build delivery links.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Applied to assignments created without an explicit location.
    #[serde(default = "default_location")]
    pub default_location: String,
    /// The HS256 secret that staff tokens are signed with. Loaded from `JWT_SECRET`.
    /// Required: configuration loading fails while it is blank.
    #[serde(default)]
    pub jwt_secret: String,
    /// Fallback lifetime of a revoked token whose `exp` cannot be read.
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Allowed CORS origins. Any origin is allowed when empty.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub sms: SmsSettings,
}

fn default_port() -> u16 {
    9090
}

fn default_db_url() -> String {
    DEFAULT_DB_FILE.to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

fn default_token_ttl_hours() -> i64 {
    24
}

// Helper to read a file, substitute env vars, and return its content.
// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(format!("Invalid substitution pattern: {e}")))?;
    let expanded_content = re.replace_all(&content, |caps: &regex::Captures| {
        let var_name = &caps["var"];
        env::var(var_name).unwrap_or_default()
    });

    Ok(Some(expanded_content.to_string()))
}

/// Loads the application configuration from a file and environment variables.
///
/// - Without an override, `config.yml` next to the server manifest is used when present;
///   every setting has a default, so the file is optional.
/// - `${VAR}` placeholders in the file are replaced from the environment.
/// - Top-level keys like `port` and `db_url` are overridden by `PORT` and `DB_URL`.
/// - Nested keys are overridden by `INTAKE_...` variables (e.g., `INTAKE_SMS__ACCOUNT_SID`).
/// - `jwt_secret` has no default; a blank secret is an error.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = ConfigBuilder::builder();

    // Layer 1: Config file.
    let content = match config_path_override {
        Some(path) => Some(read_and_substitute(path)?.ok_or_else(|| {
            ConfigError::NotFound(format!("Config file not found at '{path}'."))
        })?),
        None => {
            let user_config_path = format!("{}/config.yml", env!("CARGO_MANIFEST_DIR"));
            let content = read_and_substitute(&user_config_path)?;
            if content.is_some() {
                info!("Loading user-defined configuration from '{user_config_path}'.");
            }
            content
        }
    };
    if let Some(content) = content {
        builder = builder.add_source(File::from_str(&content, FileFormat::Yaml));
    }

    let settings = builder
        // Layer 2: Load environment variables for top-level keys like PORT.
        .add_source(Environment::default())
        // Layer 3: Load prefixed environment variables for deeper overrides.
        .add_source(
            Environment::with_prefix("INTAKE")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    if config.jwt_secret.trim().is_empty() {
        return Err(ConfigError::General(
            "jwt_secret must be set (JWT_SECRET)".to_string(),
        ));
    }
    Ok(config)
}
