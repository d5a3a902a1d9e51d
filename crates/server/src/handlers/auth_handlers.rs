//! # Authentication Route Handlers
//!
//! Token issuance happens elsewhere; this service only answers "who am I" and
//! revokes the presented token on logout.

use crate::{
    auth::middleware::AuthenticatedUser, errors::AppError, state::AppState,
    types::LogoutResponse,
};
use axum::{extract::State, response::Json};
use chrono::Utc;
use core_access::{purge_expired, revoke_token, User};
use tracing::info;

/// Returns the details of the currently authenticated user.
pub async fn get_me_handler(auth: AuthenticatedUser) -> Result<Json<User>, AppError> {
    Ok(Json(auth.user))
}

/// Revokes the presented token until its own expiry.
pub async fn logout_handler(
    State(app_state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<LogoutResponse>, AppError> {
    let db = &app_state.sqlite_provider.db;
    revoke_token(db, &auth.token, auth.expires_at).await?;
    let purged = purge_expired(db, Utc::now()).await?;
    info!(user_id = %auth.user.id, purged, "User logged out.");
    Ok(Json(LogoutResponse {
        status: "success".to_string(),
        message: "Logged out successfully".to_string(),
    }))
}
