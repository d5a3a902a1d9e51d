//! # Application State
//!
//! This module defines the shared application state (`AppState`) and the logic
//! for building it at startup. The `AppState` holds all shared resources: the
//! configuration, the database provider and the notifier that delivers form links.

use crate::config::AppConfig;
use intake::providers::{
    db::sqlite::SqliteProvider,
    notify::{http::HttpNotifier, Notifier},
};
use std::sync::Arc;
use tracing::info;

/// The shared application state, accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Arc<AppConfig>,
    /// The primary database provider.
    pub sqlite_provider: Arc<SqliteProvider>,
    /// Email and SMS transport for form dispatch.
    pub notifier: Arc<dyn Notifier>,
}

/// Builds the shared application state from the configuration.
///
/// Opens the SQLite database, brings its schema up to date and instantiates the
/// HTTP notifier from the `email` and `sms` sections.
pub async fn build_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let notifier = HttpNotifier::new(config.email.clone(), config.sms.clone())?;
    build_app_state_with_notifier(config, Arc::new(notifier)).await
}

/// Same as [`build_app_state`] with a caller-supplied notifier.
pub async fn build_app_state_with_notifier(
    config: AppConfig,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<AppState> {
    if let Some(parent) = std::path::Path::new(&config.db_url).parent() {
        if !parent.as_os_str().is_empty() && config.db_url != ":memory:" {
            std::fs::create_dir_all(parent)?;
        }
    }

    let sqlite_provider = SqliteProvider::new(&config.db_url).await?;
    info!(db_path = %config.db_url, "Initialized storage provider (SQLite).");
    // Ensure the database schema is up-to-date on startup.
    sqlite_provider.initialize_schema().await?;

    Ok(AppState {
        config: Arc::new(config),
        sqlite_provider: Arc::new(sqlite_provider),
        notifier,
    })
}
