//! Form template management.

use super::{AppError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use intake::{
    templates::{create_template, list_templates, template_fields},
    types::{FormField, NewTemplate, TemplateSummary, TemplateWithFields},
};

pub async fn list_templates_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<TemplateSummary>>, AppError> {
    Ok(Json(list_templates(&app_state.sqlite_provider.db).await?))
}

pub async fn create_template_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<NewTemplate>,
) -> Result<(StatusCode, Json<TemplateWithFields>), AppError> {
    let created = create_template(&app_state.sqlite_provider.db, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Fields of a template in position order. A template without fields is a 404.
pub async fn template_fields_handler(
    State(app_state): State<AppState>,
    Path(form_id): Path<i64>,
) -> Result<Json<Vec<FormField>>, AppError> {
    Ok(Json(
        template_fields(&app_state.sqlite_provider.db, form_id).await?,
    ))
}
