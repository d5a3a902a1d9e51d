//! # General Route Handlers
//!
//! The root and health check endpoints, and the public `/fill-form/{token}` link
//! that patients receive by email or SMS.

use super::{AppError, AppState};
use axum::{
    extract::{Path, State},
    response::Redirect,
};
use intake::delivery::resolve_token;
use tracing::info;

// --- General-Purpose Handlers ---

/// The handler for the root (`/`) endpoint.
pub async fn root() -> &'static str {
    "intake server is running."
}

/// The handler for the health check (`/health`) endpoint.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Resolves a delivery token and redirects to the frontend form editor.
///
/// Unknown tokens and tokens no longer recorded on any assignment of the embedded
/// patient yield 404.
pub async fn fill_form_handler(
    State(app_state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Redirect, AppError> {
    let resolved = resolve_token(&app_state.sqlite_provider.db, &token).await?;
    info!(
        patient_id = resolved.patient_id,
        forms = ?resolved.form_ids,
        "Resolved delivery link."
    );
    Ok(Redirect::to(
        &resolved.form_editor_url(&app_state.config.frontend_url),
    ))
}
