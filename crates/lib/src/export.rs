//! # CSV Export
//!
//! Exports patient × assignment × latest submission as a single CSV file, optionally
//! widened with one column per answered field label.

use crate::{
    errors::IntakeError,
    projection::{Snapshot, FALLBACK_FLAT_STATUS},
    types::{Assignment, AssignmentStatus, Patient, SubmissionStatus},
    validation::parse_optional_date,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::info;
use turso::Database;

const BOM: &[u8] = b"\xEF\xBB\xBF";
pub const NO_DATA: &str = "No data found.\n";

const BASE_HEADER: [&str; 8] = [
    "submission_id",
    "patient_id",
    "patient_name",
    "form_id",
    "form_name",
    "status",
    "due_date",
    "completed_date",
];
const ANSWER_HEADER: [&str; 6] = [
    "Form #",
    "Created On",
    "Location",
    "Patient",
    "Template",
    "Completed On",
];

fn default_true() -> bool {
    true
}

/// Which rows to export. Empty lists mean "no restriction".
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFilter {
    #[serde(default)]
    pub patient_ids: Vec<i64>,
    #[serde(default)]
    pub template_ids: Vec<i64>,
    #[serde(default)]
    pub statuses: Vec<String>,
    #[serde(default)]
    pub due_from: Option<String>,
    #[serde(default)]
    pub due_to: Option<String>,
    #[serde(default = "default_true")]
    pub include_archived: bool,
    #[serde(default)]
    pub include_answers: bool,
}

impl Default for ExportFilter {
    fn default() -> Self {
        ExportFilter {
            patient_ids: Vec::new(),
            template_ids: Vec::new(),
            statuses: Vec::new(),
            due_from: None,
            due_to: None,
            include_archived: true,
            include_answers: false,
        }
    }
}

/// A rendered export ready to be served as an attachment.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content: Vec<u8>,
    pub rows: usize,
}

struct Selected<'a> {
    patient: &'a Patient,
    assignment: &'a Assignment,
}

fn status_label(assignment: &Assignment) -> &'static str {
    assignment
        .status
        .map(|s| s.as_str())
        .unwrap_or(FALLBACK_FLAT_STATUS)
}

/// Builds the CSV for `filter`.
pub async fn export_forms_csv(db: &Database, filter: &ExportFilter) -> Result<ExportFile, IntakeError> {
    let due_from = parse_optional_date(filter.due_from.as_deref())?;
    let due_to = parse_optional_date(filter.due_to.as_deref())?;

    let conn = db.connect()?;
    let snapshot = Snapshot::load(&conn).await?;
    let patients: HashMap<i64, &Patient> = snapshot.patients.iter().map(|p| (p.id, p)).collect();
    let patient_ids: HashSet<i64> = filter.patient_ids.iter().copied().collect();
    let template_ids: HashSet<i64> = filter.template_ids.iter().copied().collect();
    let statuses: HashSet<String> = filter.statuses.iter().map(|s| s.trim().to_lowercase()).collect();

    let selected: Vec<Selected> = snapshot
        .assignments
        .iter()
        .filter(|a| patient_ids.is_empty() || patient_ids.contains(&a.patient_id))
        .filter(|a| template_ids.is_empty() || template_ids.contains(&a.form_id))
        .filter(|a| statuses.is_empty() || statuses.contains(&status_label(a).to_lowercase()))
        .filter(|a| filter.include_archived || a.status != Some(AssignmentStatus::Archived))
        .filter(|a| {
            if due_from.is_none() && due_to.is_none() {
                return true;
            }
            let Some(due) = a.due_date.as_deref() else {
                return false;
            };
            due_from.as_deref().map_or(true, |from| due >= from)
                && due_to.as_deref().map_or(true, |to| due <= to)
        })
        .filter_map(|a| {
            patients.get(&a.patient_id).map(|patient| Selected {
                patient: *patient,
                assignment: a,
            })
        })
        .collect();

    let filename = format!("forms-export-{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));
    if selected.is_empty() {
        return Ok(ExportFile {
            filename,
            content: NO_DATA.as_bytes().to_vec(),
            rows: 0,
        });
    }

    let records = if filter.include_answers {
        answer_records(&snapshot, &selected)
    } else {
        base_records(&snapshot, &selected)
    };

    let mut writer = csv::Writer::from_writer(BOM.to_vec());
    for record in &records {
        writer.write_record(record)?;
    }
    let content = writer
        .into_inner()
        .map_err(|e| IntakeError::DataIntegrity(format!("Failed to flush CSV: {e}")))?;

    info!(rows = selected.len(), answers = filter.include_answers, "Exported forms CSV.");
    Ok(ExportFile {
        filename,
        content,
        rows: selected.len(),
    })
}

/// The completion date: the latest submission's timestamp once it is completed.
fn completed_on(snapshot: &Snapshot, assignment: &Assignment) -> Option<String> {
    snapshot
        .latest
        .get(&(assignment.form_id, assignment.patient_id))
        .filter(|s| s.status == SubmissionStatus::Completed)
        .map(|s| s.submitted_at.clone())
}

fn base_records(snapshot: &Snapshot, selected: &[Selected]) -> Vec<Vec<String>> {
    let mut records = vec![BASE_HEADER.iter().map(|h| h.to_string()).collect()];
    for row in selected {
        let a = row.assignment;
        let submission_id = snapshot
            .latest
            .get(&(a.form_id, a.patient_id))
            .map(|s| s.submission_id.to_string())
            .unwrap_or_default();
        records.push(vec![
            submission_id,
            a.patient_id.to_string(),
            row.patient.full_name(),
            a.form_id.to_string(),
            snapshot.form_name(a.form_id),
            status_label(a).to_string(),
            a.due_date.clone().unwrap_or_default(),
            completed_on(snapshot, a).unwrap_or_default(),
        ]);
    }
    records
}

/// Rows keyed by column name; the header is the union of all labels in first-seen order.
fn answer_records(snapshot: &Snapshot, selected: &[Selected]) -> Vec<Vec<String>> {
    let mut header: Vec<String> = ANSWER_HEADER.iter().map(|h| h.to_string()).collect();
    let mut seen: HashSet<String> = header.iter().cloned().collect();
    let mut form_numbers: HashMap<i64, usize> = HashMap::new();
    let mut rows: Vec<HashMap<String, String>> = Vec::new();

    for row in selected {
        let a = row.assignment;
        let number = form_numbers.entry(a.form_id).or_insert(0);
        *number += 1;

        let mut values = HashMap::new();
        values.insert("Form #".to_string(), number.to_string());
        values.insert("Created On".to_string(), a.created.clone());
        values.insert("Location".to_string(), a.location.clone().unwrap_or_default());
        values.insert("Patient".to_string(), row.patient.full_name());
        values.insert("Template".to_string(), snapshot.form_name(a.form_id));
        values.insert(
            "Completed On".to_string(),
            completed_on(snapshot, a).unwrap_or_default(),
        );

        let responses = snapshot
            .latest
            .get(&(a.form_id, a.patient_id))
            .and_then(|s| snapshot.responses_of(s.submission_id));
        for field in snapshot.fields_of(a.form_id) {
            let label = field.field_label.clone();
            if seen.insert(label.clone()) {
                header.push(label.clone());
            }
            let value = responses
                .and_then(|r| r.get(&field.field_id))
                .cloned()
                .flatten()
                .unwrap_or_default();
            values.insert(label, value);
        }
        rows.push(values);
    }

    let mut records = vec![header.clone()];
    for values in rows {
        records.push(
            header
                .iter()
                .map(|column| values.get(column).cloned().unwrap_or_default())
                .collect(),
        );
    }
    records
}
