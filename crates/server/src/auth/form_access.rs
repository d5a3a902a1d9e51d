//! # Form Access
//!
//! The patient form routes serve two callers: staff with a bearer token, and patients
//! who followed a delivery link and carry its `?token=`. A link only opens the forms of
//! its batch, and only for the patient it was issued to.

use axum::{
    extract::{FromRequestParts, Query},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use intake::{
    delivery::{resolve_token, ResolvedToken},
    IntakeError,
};
use serde::Deserialize;
use tracing::{error, warn};

use super::middleware::{unauthorized, AuthError, AuthenticatedUser};
use crate::{errors::AppError, state::AppState};

#[derive(Debug, Deserialize, Default)]
struct LinkQuery {
    token: Option<String>,
}

/// Who is reading or writing a patient form.
#[derive(Debug, Clone)]
pub enum FormAccess {
    Staff(AuthenticatedUser),
    Link(ResolvedToken),
}

impl FormAccess {
    /// The patient a request may act on.
    ///
    /// Staff act on whichever patient they name. A link acts on its own patient when none
    /// is named, and any other patient or a form outside its batch is forbidden.
    pub fn patient_for(&self, form_id: i64, requested: Option<i64>) -> Result<Option<i64>, AppError> {
        match self {
            FormAccess::Staff(_) => Ok(requested),
            FormAccess::Link(link) => {
                if !link.covers(form_id) {
                    warn!(form_id, patient_id = link.patient_id, "Link used outside its batch.");
                    return Err(AppError::Forbidden(
                        "This link does not include the requested form".to_string(),
                    ));
                }
                match requested {
                    Some(id) if id != link.patient_id => {
                        warn!(form_id, patient_id = id, "Link used for another patient.");
                        Err(AppError::Forbidden(
                            "This link was issued for another patient".to_string(),
                        ))
                    }
                    _ => Ok(Some(link.patient_id)),
                }
            }
        }
    }
}

impl FromRequestParts<AppState> for FormAccess {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key(AUTHORIZATION) {
            return AuthenticatedUser::from_request_parts(parts, state)
                .await
                .map(FormAccess::Staff);
        }

        let token = Query::<LinkQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.token)
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| unauthorized("A staff token or a form link token is required."))?;

        match resolve_token(&state.sqlite_provider.db, &token).await {
            Ok(resolved) => Ok(FormAccess::Link(resolved)),
            Err(IntakeError::Validation(_) | IntakeError::NotFound(_)) => {
                Err(unauthorized("Invalid or expired link."))
            }
            Err(e) => {
                error!("Failed to resolve form link token: {}", e);
                Err(AuthError(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Could not verify link.".to_string(),
                ))
            }
        }
    }
}
