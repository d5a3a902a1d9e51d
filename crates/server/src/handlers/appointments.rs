//! Appointment booking and the staff and customer appointment views.

use super::{AppError, AppState};
use crate::types::{AppointmentQuery, PostponePayload};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use intake::{
    appointments::{
        book_appointment, customer_appointments, delete_appointment, list_appointments,
        postpone_appointment,
    },
    types::{Appointment, AppointmentFilter, NewAppointment},
};
use serde_json::{json, Value};

pub async fn book_appointment_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let appointment = book_appointment(&app_state.sqlite_provider.db, payload).await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// `?upcoming=0` includes past appointments; any other value (or none) hides them.
pub async fn list_appointments_handler(
    State(app_state): State<AppState>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let upcoming = !matches!(
        query.upcoming.as_deref().map(str::trim),
        Some("0") | Some("false")
    );
    let filter = AppointmentFilter {
        name: query.name,
        email: query.email,
        phone: query.phone,
        upcoming,
    };
    Ok(Json(
        list_appointments(&app_state.sqlite_provider.db, filter).await?,
    ))
}

pub async fn postpone_appointment_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PostponePayload>,
) -> Result<Json<Appointment>, AppError> {
    Ok(Json(
        postpone_appointment(
            &app_state.sqlite_provider.db,
            id,
            payload.new_date.as_deref(),
            payload.new_time.as_deref(),
        )
        .await?,
    ))
}

pub async fn delete_appointment_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    delete_appointment(&app_state.sqlite_provider.db, id).await?;
    Ok(Json(json!({ "ok": true, "deleted": id })))
}

pub async fn customer_appointments_handler(
    State(app_state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    Ok(Json(
        customer_appointments(&app_state.sqlite_provider.db, patient_id).await?,
    ))
}
