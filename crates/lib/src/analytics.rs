//! # Analytics
//!
//! Counters for the dashboard's overview cards.

use crate::{
    assignments::all_assignments,
    errors::IntakeError,
    patients::all_patients,
    providers::db::sqlite::TIMESTAMP_FORMAT,
    submissions::latest_submissions,
    types::AssignmentStatus,
    validation::parse_date,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use turso::Database;

/// A closed range of days, `[start, end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Parses a range where both ends are required.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, IntakeError> {
        match Self::parse_optional(start, end)? {
            Some(range) => Ok(range),
            None => Err(IntakeError::validation("startDate and endDate are required")),
        }
    }

    /// Parses a range that may be omitted entirely; a half-given range is rejected.
    pub fn parse_optional(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>, IntakeError> {
        let start = start.map(str::trim).filter(|s| !s.is_empty());
        let end = end.map(str::trim).filter(|s| !s.is_empty());
        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let start = day(start)?;
                let end = day(end)?;
                if end < start {
                    return Err(IntakeError::validation("endDate must not be before startDate"));
                }
                Ok(Some(DateRange { start, end }))
            }
            _ => Err(IntakeError::validation("startDate and endDate are required")),
        }
    }

    /// Whether a stored timestamp falls within `[start, end + 1 day)`.
    pub fn contains(&self, timestamp: &str) -> bool {
        let lower = self.start.format("%Y-%m-%d").to_string();
        let upper = (self.end + Duration::days(1)).format("%Y-%m-%d").to_string();
        timestamp >= lower.as_str() && timestamp < upper.as_str()
    }
}

fn day(raw: &str) -> Result<NaiveDate, IntakeError> {
    let normalised = parse_date(raw)?;
    NaiveDate::parse_from_str(&normalised, "%Y-%m-%d")
        .map_err(|_| IntakeError::validation("Invalid date format. Use YYYY-MM-DD or MM/DD/YYYY"))
}

fn rate(part: usize, total: usize) -> String {
    if total == 0 {
        return "0%".to_string();
    }
    format!("{}%", (100.0 * part as f64 / total as f64).round() as i64)
}

/// Assignment counters for one range.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FormStats {
    #[serde(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Assigned")]
    pub assigned: usize,
    #[serde(rename = "Completed")]
    pub completed: usize,
    #[serde(rename = "CompletionRate")]
    pub completion_rate: String,
    #[serde(rename = "Within24_Completed")]
    pub within24_completed: usize,
    #[serde(rename = "Within24_CompletionRate")]
    pub within24_completion_rate: String,
}

/// Patient counters for one range. Only `Total` is tracked; the intake-method
/// breakdown is reported as zero.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PatientStats {
    pub total: usize,
    #[serde(rename = "Bulk_Import")]
    pub bulk_import: usize,
    pub integration: usize,
    #[serde(rename = "Patient_Self_Scheduling")]
    pub patient_self_scheduling: usize,
    #[serde(rename = "Sent_Forms")]
    pub sent_forms: usize,
    #[serde(rename = "Staff_Created")]
    pub staff_created: usize,
    #[serde(rename = "Staff_Scheduled_Appointments")]
    pub staff_scheduled_appointments: usize,
    #[serde(rename = "Static_Anonymous_Link")]
    pub static_anonymous_link: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Comparison<T> {
    pub current: T,
    pub compare: Option<T>,
}

/// Within-24h means the latest submission landed no later than a day after the assignment was created.
fn within_a_day(created: &str, submitted_at: &str) -> bool {
    let (Ok(created), Ok(submitted)) = (
        NaiveDateTime::parse_from_str(created, TIMESTAMP_FORMAT),
        NaiveDateTime::parse_from_str(submitted_at, TIMESTAMP_FORMAT),
    ) else {
        return false;
    };
    let elapsed = submitted - created;
    elapsed >= Duration::zero() && elapsed <= Duration::hours(24)
}

pub async fn form_stats(
    db: &Database,
    range: &DateRange,
    compare: Option<&DateRange>,
) -> Result<Comparison<FormStats>, IntakeError> {
    let conn = db.connect()?;
    let assignments = all_assignments(&conn).await?;
    let latest = latest_submissions(&conn).await?;

    let stats_for = |range: &DateRange| {
        let in_range: Vec<_> = assignments
            .iter()
            .filter(|a| range.contains(&a.created))
            .collect();
        let assigned = in_range
            .iter()
            .filter(|a| {
                matches!(
                    a.status,
                    Some(AssignmentStatus::Active) | Some(AssignmentStatus::NotStarted)
                )
            })
            .count();
        let completed: Vec<_> = in_range
            .iter()
            .filter(|a| a.status == Some(AssignmentStatus::Completed))
            .collect();
        let within24 = completed
            .iter()
            .filter(|a| {
                latest
                    .get(&(a.form_id, a.patient_id))
                    .is_some_and(|s| within_a_day(&a.created, &s.submitted_at))
            })
            .count();
        FormStats {
            total: in_range.len(),
            assigned,
            completed: completed.len(),
            completion_rate: rate(completed.len(), in_range.len()),
            within24_completed: within24,
            within24_completion_rate: rate(within24, completed.len()),
        }
    };

    Ok(Comparison {
        current: stats_for(range),
        compare: compare.map(stats_for),
    })
}

/// Patients registered in `range`, or all patients when no range is given.
pub async fn patient_stats(
    db: &Database,
    range: Option<&DateRange>,
    compare: Option<&DateRange>,
) -> Result<Comparison<PatientStats>, IntakeError> {
    let conn = db.connect()?;
    let patients = all_patients(&conn).await?;

    let stats_for = |range: Option<&DateRange>| PatientStats {
        total: patients
            .iter()
            .filter(|p| range.map_or(true, |r| r.contains(&p.created_on)))
            .count(),
        ..PatientStats::default()
    };

    Ok(Comparison {
        current: stats_for(range),
        compare: compare.map(|c| stats_for(Some(c))),
    })
}
