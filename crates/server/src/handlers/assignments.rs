//! Assigning templates to patients, bulk archiving and the per-patient form list.

use super::{id_from_value, AppError, AppState};
use crate::types::{AssignFormsPayload, MessageResponse, PatientIdsPayload};
use axum::{
    extract::{Path, State},
    Json,
};
use intake::{
    assignments::{archive_patients, assign_forms, unarchive_patients},
    projection::{patient_forms, PatientFormRow},
    types::AssignRequest,
};
use serde_json::{json, Value};

pub async fn assign_forms_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<AssignFormsPayload>,
) -> Result<Json<MessageResponse>, AppError> {
    let patient_id = payload
        .patient_id
        .as_ref()
        .filter(|v| !v.is_null())
        .map(|v| id_from_value(v, "patientId"))
        .transpose()?;
    let form_ids = payload
        .form_ids
        .iter()
        .map(|v| id_from_value(v, "formId"))
        .collect::<Result<Vec<_>, _>>()?;

    let count = assign_forms(
        &app_state.sqlite_provider.db,
        AssignRequest {
            patient_id,
            form_ids,
            due_date: payload.due_date,
            location: payload.location,
        },
        &app_state.config.default_location,
    )
    .await?;

    Ok(Json(MessageResponse {
        message: format!("{count} form(s) assigned successfully"),
    }))
}

pub async fn archive_patients_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<PatientIdsPayload>,
) -> Result<Json<Value>, AppError> {
    let updated = archive_patients(&app_state.sqlite_provider.db, &payload.patient_ids).await?;
    Ok(Json(json!({
        "message": "Patients archived",
        "updated": updated,
    })))
}

pub async fn unarchive_patients_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<PatientIdsPayload>,
) -> Result<Json<Value>, AppError> {
    let updated =
        unarchive_patients(&app_state.sqlite_provider.db, &payload.patient_ids).await?;
    Ok(Json(json!({
        "message": "Patients unarchived",
        "updated": updated,
    })))
}

/// Assigned forms of one patient with completion. Empty when nothing is assigned.
pub async fn patient_forms_handler(
    State(app_state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Vec<PatientFormRow>>, AppError> {
    Ok(Json(
        patient_forms(&app_state.sqlite_provider.db, patient_id).await?,
    ))
}
