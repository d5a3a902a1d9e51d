//! Clinic locations.

use super::{AppError, AppState};
use crate::types::MessageResponse;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use intake::{
    locations::{add_location, list_locations, toggle_location, update_location},
    types::{Location, LocationInput},
};

pub async fn list_locations_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<Location>>, AppError> {
    Ok(Json(list_locations(&app_state.sqlite_provider.db).await?))
}

pub async fn add_location_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<LocationInput>,
) -> Result<(StatusCode, Json<Location>), AppError> {
    let location = add_location(&app_state.sqlite_provider.db, payload).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn update_location_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<LocationInput>,
) -> Result<Json<Location>, AppError> {
    Ok(Json(
        update_location(&app_state.sqlite_provider.db, id, payload).await?,
    ))
}

pub async fn toggle_location_handler(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let active = toggle_location(&app_state.sqlite_provider.db, id).await?;
    let label = if active { "Active" } else { "Inactive" };
    Ok(Json(MessageResponse {
        message: format!("Location status updated to {label}"),
    }))
}
