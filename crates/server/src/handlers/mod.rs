//! # API Route Handlers
//!
//! This module organizes all the Axum route handlers for the `intake-server`.
//! The handlers are split into logical sub-modules based on the records they serve.

// Sub-modules for different handler categories.
pub mod analytics;
pub mod appointments;
pub mod assignments;
pub mod auth_handlers;
pub mod dispatch;
pub mod exports;
pub mod forms;
pub mod general;
pub mod locations;
pub mod patients;
pub mod templates;
pub mod users;

// Re-export all handlers from the sub-modules to make them easily accessible
// to the router under a single `handlers::` path.
pub use analytics::*;
pub use appointments::*;
pub use assignments::*;
pub use auth_handlers::*;
pub use dispatch::*;
pub use exports::*;
pub use forms::*;
pub use general::*;
pub use locations::*;
pub use patients::*;
pub use templates::*;
pub use users::*;

// Shared items used by multiple handler modules.
use super::{errors::AppError, state::AppState};
use intake::{
    validation::{integral_id, parse_id},
    IntakeError,
};
use serde_json::Value;

/// Reads an identifier that the frontend may send as a JSON number or a string.
pub(crate) fn id_from_value(value: &Value, name: &str) -> Result<i64, IntakeError> {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(id), _) => Ok(id),
            (None, f) => f
                .and_then(integral_id)
                .ok_or_else(|| IntakeError::validation(format!("Invalid {name} {n}"))),
        },
        Value::String(s) => parse_id(s, name),
        _ => Err(IntakeError::validation(format!("Missing {name}"))),
    }
}

/// Reads a form reference: a bare id, or a form object carrying `id`, `formId` or `form_id`.
pub(crate) fn form_ref(value: &Value) -> Result<i64, IntakeError> {
    match value {
        Value::Object(form) => {
            let id = ["id", "formId", "form_id"]
                .iter()
                .find_map(|key| form.get(*key).filter(|v| !v.is_null()))
                .unwrap_or(&Value::Null);
            id_from_value(id, "formId")
        }
        other => id_from_value(other, "formId"),
    }
}
