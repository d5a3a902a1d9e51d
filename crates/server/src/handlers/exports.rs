//! CSV export of assignments and their latest submissions.

use super::{AppError, AppState};
use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use intake::export::{export_forms_csv, ExportFilter};

pub async fn export_forms_csv_handler(
    State(app_state): State<AppState>,
    Json(filter): Json<ExportFilter>,
) -> Result<Response, AppError> {
    let file = export_forms_csv(&app_state.sqlite_provider.db, &filter).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file.filename))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid export filename: {e}")))?;
    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.content,
    )
        .into_response())
}
