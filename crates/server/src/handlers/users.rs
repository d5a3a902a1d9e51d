//! Staff profiles and their location assignments.

use super::{AppError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use intake::{
    staff::{create_staff, get_staff, list_staff, update_staff},
    types::{NewStaffMember, StaffMember, StaffUpdate},
};
use tracing::info;

pub async fn list_users_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<StaffMember>>, AppError> {
    Ok(Json(list_staff(&app_state.sqlite_provider.db).await?))
}

pub async fn create_user_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<NewStaffMember>,
) -> Result<(StatusCode, Json<StaffMember>), AppError> {
    let member = create_staff(&app_state.sqlite_provider.db, payload).await?;
    info!(staff_id = member.id, "Staff member created via API.");
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn get_user_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StaffMember>, AppError> {
    Ok(Json(get_staff(&app_state.sqlite_provider.db, id).await?))
}

pub async fn update_user_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<StaffUpdate>,
) -> Result<Json<StaffMember>, AppError> {
    Ok(Json(
        update_staff(&app_state.sqlite_provider.db, id, payload).await?,
    ))
}
