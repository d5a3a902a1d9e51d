//! # Common Test Utilities
//!
//! This module centralizes the test harness used across the `intake-server`
//! integration tests:
//!
//! - `TestApp`: spawns a real server on a random port over a temporary SQLite file,
//!   with a recording `MockNotifier` in place of the email and SMS providers.
//! - JWT helpers that sign staff tokens with the app's secret.

// Allow unused code because this is a test utility module, and not all
// functions might be used by every test file that includes it.
#![allow(unused)]

use anyhow::Result;
use axum::serve;
use intake::types::{Patient, TemplateWithFields};
use intake_server::{
    auth::middleware::Claims,
    config, router,
    state::{build_app_state_with_notifier, AppState},
};
use intake_test_utils::MockNotifier;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{redirect::Policy, Client};
use std::{
    fs::File,
    io::Write,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tempfile::{tempdir, NamedTempFile, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};
use turso::Database;

pub const FRONTEND_URL: &str = "http://frontend.test";

// --- Full Application Test Harness ---

/// A harness for end-to-end testing of the Axum server.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub notifier: MockNotifier,
    pub db_path: PathBuf,
    pub app_state: AppState,
    _db_file: NamedTempFile,
    _config_dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawns the application server and returns a `TestApp` instance.
    pub async fn spawn() -> Result<Self> {
        dotenvy::dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();

        let db_file = NamedTempFile::new()?;
        let db_path = db_file.path().to_path_buf();

        let config_dir = tempdir()?;
        let config_path = config_dir.path().join("config.yml");
        let config_content = r#"
port: 0
default_location: "GIA HR"
token_ttl_hours: 24
jwt_secret: "test-jwt-secret"
"#;
        let mut file = File::create(&config_path)?;
        file.write_all(config_content.as_bytes())?;

        let mut config = config::get_config(Some(config_path.to_str().unwrap()))?;
        // Pin the values the tests assert on, whatever the environment says.
        config.db_url = db_path.to_str().unwrap().to_string();
        config.frontend_url = FRONTEND_URL.to_string();
        config.public_base_url = "http://intake.test".to_string();
        config.jwt_secret = "test-jwt-secret".to_string();

        let notifier = MockNotifier::new();
        let app_state = build_app_state_with_notifier(config, Arc::new(notifier.clone())).await?;
        let app_state_for_harness = app_state.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(app_state);
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Self {
            address,
            // Redirects are asserted on, not followed.
            client: Client::builder().redirect(Policy::none()).build()?,
            notifier,
            db_path,
            app_state: app_state_for_harness,
            _db_file: db_file,
            _config_dir: config_dir,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn db(&self) -> &Database {
        &self.app_state.sqlite_provider.db
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// A valid staff token for `sub`.
    pub fn token(&self, sub: &str) -> Result<String> {
        generate_jwt(&self.app_state.config.jwt_secret, sub, 3600)
    }

    /// Issues and records a delivery link token, as a dispatch would.
    pub async fn link_token(&self, patient_id: i64, form_ids: &[i64]) -> Result<String> {
        let token = intake::delivery::issue_token(patient_id, form_ids);
        intake::delivery::record_token(self.db(), patient_id, form_ids, &token, None, Some("GIA HR"))
            .await?;
        Ok(token)
    }

    pub async fn patient(&self, first_name: &str, last_name: &str) -> Result<Patient> {
        let patient = intake::patients::create_patient(
            self.db(),
            intake::types::NewPatient {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: Some(format!("{}@example.com", first_name.to_lowercase())),
                phone: Some("(555) 123-4567".to_string()),
                dob: Some("1990-04-01".to_string()),
            },
        )
        .await?;
        Ok(patient)
    }

    pub async fn template(&self, name: &str, labels: &[&str]) -> Result<TemplateWithFields> {
        let template = intake::templates::create_template(
            self.db(),
            intake::types::NewTemplate {
                name: name.to_string(),
                form_url: None,
                fields: labels
                    .iter()
                    .map(|label| intake::types::NewField {
                        label: label.to_string(),
                        field_type: "text".to_string(),
                        required: false,
                    })
                    .collect(),
            },
        )
        .await?;
        Ok(template)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Signs a token for `sub` that expires `expires_in_secs` from now (negative for the past).
pub fn generate_jwt(secret: &str, sub: &str, expires_in_secs: i64) -> Result<String> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
    let claims = Claims {
        sub: sub.to_string(),
        exp: (now + expires_in_secs) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    Ok(token)
}
