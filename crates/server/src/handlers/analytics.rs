//! Dashboard analytics over a date range, with an optional comparison range.

use super::{AppError, AppState};
use crate::types::AnalyticsQuery;
use axum::{
    extract::{Query, State},
    Json,
};
use intake::analytics::{form_stats, patient_stats, Comparison, DateRange, FormStats, PatientStats};

fn compare_range(query: &AnalyticsQuery) -> Result<Option<DateRange>, AppError> {
    Ok(DateRange::parse_optional(
        query.compare_start_date.as_deref(),
        query.compare_end_date.as_deref(),
    )?)
}

/// Requires `startDate` and `endDate`.
pub async fn form_analytics_handler(
    State(app_state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Comparison<FormStats>>, AppError> {
    let range = DateRange::parse(query.start_date.as_deref(), query.end_date.as_deref())?;
    let compare = compare_range(&query)?;
    Ok(Json(
        form_stats(&app_state.sqlite_provider.db, &range, compare.as_ref()).await?,
    ))
}

/// Counts every patient when no range is given.
pub async fn patient_analytics_handler(
    State(app_state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Comparison<PatientStats>>, AppError> {
    let range =
        DateRange::parse_optional(query.start_date.as_deref(), query.end_date.as_deref())?;
    let compare = compare_range(&query)?;
    Ok(Json(
        patient_stats(
            &app_state.sqlite_provider.db,
            range.as_ref(),
            compare.as_ref(),
        )
        .await?,
    ))
}
