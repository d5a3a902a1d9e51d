//! # Authentication Middleware
//!
//! This module provides the Axum extractor for JWT-based staff authentication.
//! `AuthenticatedUser` guards every staff route: a request must carry a valid,
//! unexpired and not revoked `Authorization: Bearer <token>` header.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{DateTime, Utc};
use core_access::{get_or_create_user, is_token_revoked, User};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::state::AppState;

/// Represents the claims we expect to find in the JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The subject of the token, which we use as the unique user identifier.
    pub sub: String,
    /// The expiration timestamp.
    pub exp: usize,
}

/// An Axum extractor that provides the currently authenticated staff member.
///
/// Besides the resolved `User`, it keeps the raw token and its expiry so that
/// logout can revoke exactly the presented token until it would expire anyway.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A custom rejection type for authentication failures.
pub struct AuthError(pub(crate) StatusCode, pub(crate) String);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

pub(crate) fn unauthorized(message: &str) -> AuthError {
    AuthError(StatusCode::UNAUTHORIZED, message.to_string())
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|e| {
                    debug!("Missing or malformed Authorization header: {}", e);
                    unauthorized("Missing or invalid Authorization header.")
                })?;
        let token = bearer.token().to_string();

        let token_data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(state.config.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|e| {
            warn!("JWT validation failed: {}", e);
            unauthorized("Invalid or expired token.")
        })?;

        // `Validation::default()` allows a leeway on `exp`; staff tokens get none.
        let now = Utc::now();
        if (token_data.claims.exp as i64) < now.timestamp() {
            warn!(
                "Token has expired. exp: {}, current: {}",
                token_data.claims.exp,
                now.timestamp()
            );
            return Err(unauthorized("Invalid or expired token."));
        }

        let db = &state.sqlite_provider.db;
        let revoked = is_token_revoked(db, &token).await.map_err(|e| {
            error!("Failed to check token revocation: {}", e);
            AuthError(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Could not verify token.".to_string(),
            )
        })?;
        if revoked {
            return Err(unauthorized("Token has been revoked."));
        }

        let user = get_or_create_user(db, &token_data.claims.sub)
            .await
            .map_err(|e| {
                error!("Failed to get or create user: {}", e);
                AuthError(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Could not retrieve user: {e}"),
                )
            })?;

        let expires_at = DateTime::<Utc>::from_timestamp(token_data.claims.exp as i64, 0)
            .unwrap_or_else(|| now + chrono::Duration::hours(state.config.token_ttl_hours));

        Ok(AuthenticatedUser {
            user,
            token,
            expires_at,
        })
    }
}
