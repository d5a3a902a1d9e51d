//! # Form Handlers
//!
//! The form detail, save and "new submission" endpoints reached from a delivery link,
//! plus the two dashboard projections used by staff.

use super::{id_from_value, AppError, AppState};
use crate::{
    auth::form_access::FormAccess,
    types::{PatientQuery, SaveFormPayload},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use intake::{
    projection::{flat_dashboard, form_detail, grouped_dashboard, DashboardRow, FormDetail, PatientGroup},
    submissions::{save_submission, start_submission},
    types::{FieldAnswer, SaveOutcome, SaveSubmission, SubmissionStatus},
    validation::parse_id,
    IntakeError,
};
use serde_json::{json, Value};
use tracing::info;

fn queried_patient(query: &PatientQuery) -> Result<Option<i64>, IntakeError> {
    match query.patient_id.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_id(raw, "patientId").map(Some),
    }
}

fn missing_patient() -> AppError {
    IntakeError::validation("Missing patientId").into()
}

/// A template with fields and the current answers of the patient in scope.
///
/// Staff name the patient with `?patientId=`; a link is scoped to its own patient.
pub async fn form_detail_handler(
    State(app_state): State<AppState>,
    access: FormAccess,
    Path(form_id): Path<i64>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<FormDetail>, AppError> {
    let patient_id = access.patient_for(form_id, queried_patient(&query)?)?;
    Ok(Json(
        form_detail(&app_state.sqlite_provider.db, form_id, patient_id).await?,
    ))
}

fn to_save_request(payload: SaveFormPayload) -> Result<SaveSubmission, IntakeError> {
    let status = match payload.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            SubmissionStatus::parse(raw)
                .ok_or_else(|| IntakeError::validation(format!("Invalid status {raw}")))?,
        ),
    };
    let answers = payload
        .fields
        .iter()
        .filter_map(|item| {
            FieldAnswer::from_json(
                item.get("field_id").unwrap_or(&Value::Null),
                item.get("response_value").unwrap_or(&Value::Null),
            )
        })
        .collect();
    Ok(SaveSubmission {
        answers,
        status,
        due_date: payload.due_date,
        location: payload.location,
    })
}

/// Saves answers and returns the submission id and completion.
///
/// The patient comes from `?patientId=`, else from the body's `patientId`, else from the link.
pub async fn save_form_handler(
    State(app_state): State<AppState>,
    access: FormAccess,
    Path(form_id): Path<i64>,
    Query(query): Query<PatientQuery>,
    Json(payload): Json<SaveFormPayload>,
) -> Result<Json<SaveOutcome>, AppError> {
    let requested = match queried_patient(&query)? {
        Some(id) => Some(id),
        None => match &payload.patient_id {
            None | Some(Value::Null) => None,
            Some(value) => Some(id_from_value(value, "patientId")?),
        },
    };
    let patient_id = access
        .patient_for(form_id, requested)?
        .ok_or_else(missing_patient)?;
    let request = to_save_request(payload)?;
    info!(form_id, patient_id, answers = request.answers.len(), "Saving form.");
    Ok(Json(
        save_submission(&app_state.sqlite_provider.db, form_id, patient_id, request).await?,
    ))
}

/// Starts a fresh submission for the patient in scope.
pub async fn start_submission_handler(
    State(app_state): State<AppState>,
    access: FormAccess,
    Path(form_id): Path<i64>,
    Query(query): Query<PatientQuery>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = access
        .patient_for(form_id, queried_patient(&query)?)?
        .ok_or_else(missing_patient)?;
    let submission = start_submission(&app_state.sqlite_provider.db, form_id, patient_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "submissionId": submission.submission_id,
            "status": submission.status,
            "submittedAt": submission.submitted_at,
        })),
    ))
}

// --- Dashboard ---

pub async fn dashboard_data_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<DashboardRow>>, AppError> {
    Ok(Json(flat_dashboard(&app_state.sqlite_provider.db).await?))
}

pub async fn dashboard_grouped_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<PatientGroup>>, AppError> {
    Ok(Json(grouped_dashboard(&app_state.sqlite_provider.db).await?))
}
