//! Patient records: CRUD and the free-text search used by the dashboard.

use super::{AppError, AppState};
use crate::types::{MessageResponse, SearchQuery};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use intake::{
    patients::{
        create_patient, delete_patient, get_patient, list_patients, search_patients,
        update_patient,
    },
    types::{NewPatient, Patient, PatientMatch, PatientUpdate},
};

pub async fn list_patients_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<Patient>>, AppError> {
    Ok(Json(list_patients(&app_state.sqlite_provider.db).await?))
}

pub async fn create_patient_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<NewPatient>,
) -> Result<(StatusCode, Json<Patient>), AppError> {
    let patient = create_patient(&app_state.sqlite_provider.db, payload).await?;
    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn get_patient_handler(
    State(app_state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Patient>, AppError> {
    Ok(Json(
        get_patient(&app_state.sqlite_provider.db, patient_id).await?,
    ))
}

pub async fn update_patient_handler(
    State(app_state): State<AppState>,
    Path(patient_id): Path<i64>,
    Json(payload): Json<PatientUpdate>,
) -> Result<Json<Patient>, AppError> {
    Ok(Json(
        update_patient(&app_state.sqlite_provider.db, patient_id, payload).await?,
    ))
}

pub async fn delete_patient_handler(
    State(app_state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    delete_patient(&app_state.sqlite_provider.db, patient_id).await?;
    Ok(Json(MessageResponse {
        message: "Patient deleted".to_string(),
    }))
}

pub async fn search_patients_handler(
    State(app_state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PatientMatch>>, AppError> {
    Ok(Json(
        search_patients(&app_state.sqlite_provider.db, &query.q).await?,
    ))
}
