//! # Submission Recorder
//!
//! Persists a patient's answers. A save always lands on the *current* submission of
//! the (form, patient) pair, the one with the latest `submitted_at` (ties broken by the
//! highest id), creating it on first save. A new current submission is only started by
//! [`start_submission`].
//!
//! Concurrent saves for the same pair are not serialised against each other: the last
//! writer wins on the submission status, its timestamp and each individual response.

use crate::{
    assignments::{find_assignment, set_status},
    completion,
    errors::IntakeError,
    patients::find_patient,
    providers::db::sqlite::{
        begin, finish, get_i64, get_opt_text, get_text, int, opt_text, text, timestamp_now,
    },
    templates::{fields_for_template, find_template},
    types::{AssignmentStatus, FieldAnswer, SaveOutcome, SaveSubmission, Submission, SubmissionStatus},
    validation::parse_optional_date,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use turso::{params, params::Params, Connection, Database, Row, Value as TursoValue};

const SUBMISSION_COLUMNS: &str = "submission_id, form_id, patient_id, status, submitted_at";

impl TryFrom<&Row> for Submission {
    type Error = IntakeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let raw_status = get_text(row, 3)?;
        let status = SubmissionStatus::parse(&raw_status).ok_or_else(|| {
            IntakeError::DataIntegrity(format!("Unknown submission status '{raw_status}'"))
        })?;
        Ok(Submission {
            submission_id: get_i64(row, 0)?,
            form_id: get_i64(row, 1)?,
            patient_id: get_i64(row, 2)?,
            status,
            submitted_at: get_text(row, 4)?,
        })
    }
}

impl FieldAnswer {
    /// Builds an answer from loosely typed JSON.
    ///
    /// Field ids arrive as strings or numbers (`"3.1"` or `3.1`); values may be any
    /// scalar. `null` ids are dropped, `null` values are stored as NULL.
    pub fn from_json(field_id: &Value, value: &Value) -> Option<Self> {
        let field_id = match field_id {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        };
        if field_id.is_empty() {
            return None;
        }
        let value = match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
        Some(FieldAnswer { field_id, value })
    }
}

/// The current submission of a (form, patient) pair.
pub(crate) async fn latest_submission(
    conn: &Connection,
    form_id: i64,
    patient_id: i64,
) -> Result<Option<Submission>, IntakeError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM form_submissions
                 WHERE form_id = ? AND patient_id = ?
                 ORDER BY submitted_at DESC, submission_id DESC LIMIT 1"
            ),
            params![form_id, patient_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(Submission::try_from(&row)?)),
        None => Ok(None),
    }
}

/// The current submission of every (form, patient) pair, keyed by `(form_id, patient_id)`.
///
/// Uses the same ranking as [`latest_submission`].
pub(crate) async fn latest_submissions(
    conn: &Connection,
) -> Result<HashMap<(i64, i64), Submission>, IntakeError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {SUBMISSION_COLUMNS} FROM form_submissions
                 ORDER BY submitted_at DESC, submission_id DESC"
            ),
            (),
        )
        .await?;
    let mut latest = HashMap::new();
    while let Some(row) = rows.next().await? {
        let submission = Submission::try_from(&row)?;
        latest
            .entry((submission.form_id, submission.patient_id))
            .or_insert(submission);
    }
    Ok(latest)
}

/// The answers of one submission, keyed by field id.
pub(crate) async fn responses_for(
    conn: &Connection,
    submission_id: i64,
) -> Result<HashMap<String, Option<String>>, IntakeError> {
    let mut rows = conn
        .query(
            "SELECT field_id, response_value FROM form_responses WHERE submission_id = ?",
            params![submission_id],
        )
        .await?;
    let mut responses = HashMap::new();
    while let Some(row) = rows.next().await? {
        responses.insert(get_text(&row, 0)?, get_opt_text(&row, 1)?);
    }
    Ok(responses)
}

/// The answers of several submissions, keyed by submission id then field id.
pub(crate) async fn responses_for_many(
    conn: &Connection,
    submission_ids: &[i64],
) -> Result<HashMap<i64, HashMap<String, Option<String>>>, IntakeError> {
    let mut all: HashMap<i64, HashMap<String, Option<String>>> = HashMap::new();
    if submission_ids.is_empty() {
        return Ok(all);
    }
    let placeholders = vec!["?"; submission_ids.len()].join(", ");
    let values: Vec<TursoValue> = submission_ids.iter().map(|id| int(*id)).collect();
    let mut rows = conn
        .query(
            &format!(
                "SELECT submission_id, field_id, response_value FROM form_responses
                 WHERE submission_id IN ({placeholders})"
            ),
            Params::Positional(values),
        )
        .await?;
    while let Some(row) = rows.next().await? {
        all.entry(get_i64(&row, 0)?)
            .or_default()
            .insert(get_text(&row, 1)?, get_opt_text(&row, 2)?);
    }
    Ok(all)
}

async fn insert_submission(
    conn: &Connection,
    form_id: i64,
    patient_id: i64,
    status: SubmissionStatus,
) -> Result<Submission, IntakeError> {
    let submitted_at = timestamp_now();
    let mut rows = conn
        .query(
            "INSERT INTO form_submissions (form_id, patient_id, status, submitted_at)
             VALUES (?, ?, ?, ?) RETURNING submission_id",
            params![form_id, patient_id, status.as_str(), submitted_at.clone()],
        )
        .await?;
    let submission_id = match rows.next().await? {
        Some(row) => get_i64(&row, 0)?,
        None => {
            return Err(IntakeError::DataIntegrity(
                "Insert into form_submissions returned no id".to_string(),
            ))
        }
    };
    Ok(Submission {
        submission_id,
        form_id,
        patient_id,
        status,
        submitted_at,
    })
}

/// Writes one answer, replacing any earlier answer for the same field on this submission.
async fn upsert_response(
    conn: &Connection,
    submission_id: i64,
    answer: &FieldAnswer,
) -> Result<(), IntakeError> {
    let mut rows = conn
        .query(
            "SELECT response_id FROM form_responses WHERE submission_id = ? AND field_id = ?",
            params![submission_id, answer.field_id.clone()],
        )
        .await?;
    let existing = match rows.next().await? {
        Some(row) => Some(get_i64(&row, 0)?),
        None => None,
    };
    drop(rows);

    match existing {
        Some(response_id) => {
            conn.execute(
                "UPDATE form_responses SET response_value = ? WHERE response_id = ?",
                Params::Positional(vec![opt_text(answer.value.as_deref()), int(response_id)]),
            )
            .await?;
        }
        None => {
            conn.execute(
                "INSERT INTO form_responses (submission_id, field_id, response_value) VALUES (?, ?, ?)",
                Params::Positional(vec![
                    int(submission_id),
                    text(&answer.field_id),
                    opt_text(answer.value.as_deref()),
                ]),
            )
            .await?;
        }
    }
    Ok(())
}

/// Saves answers to the current submission of `(form_id, patient_id)` and returns the
/// recomputed completion.
///
/// Answers for field ids that do not belong to the template are skipped without error.
/// When the effective status is `Completed`, an existing assignment is marked completed;
/// a due date or location in the request is copied onto the assignment.
pub async fn save_submission(
    db: &Database,
    form_id: i64,
    patient_id: i64,
    request: SaveSubmission,
) -> Result<SaveOutcome, IntakeError> {
    let due_date = parse_optional_date(request.due_date.as_deref())?;

    let conn = db.connect()?;
    if find_template(&conn, form_id).await?.is_none() {
        return Err(IntakeError::not_found("Form not found"));
    }
    if find_patient(&conn, patient_id).await?.is_none() {
        return Err(IntakeError::not_found("Patient not found"));
    }

    begin(&conn).await?;
    let result = record(&conn, form_id, patient_id, &request, due_date.as_deref()).await;
    let outcome = finish(&conn, result).await?;

    info!(
        form_id,
        patient_id,
        submission_id = outcome.submission_id,
        completion = outcome.completion,
        "Saved form submission."
    );
    Ok(outcome)
}

async fn record(
    conn: &Connection,
    form_id: i64,
    patient_id: i64,
    request: &SaveSubmission,
    due_date: Option<&str>,
) -> Result<SaveOutcome, IntakeError> {
    let status = request.status.unwrap_or(SubmissionStatus::Completed);

    let submission_id = match latest_submission(conn, form_id, patient_id).await? {
        Some(current) => {
            conn.execute(
                "UPDATE form_submissions SET status = ?, submitted_at = ? WHERE submission_id = ?",
                params![status.as_str(), timestamp_now(), current.submission_id],
            )
            .await?;
            current.submission_id
        }
        None => {
            insert_submission(conn, form_id, patient_id, status)
                .await?
                .submission_id
        }
    };

    let fields = fields_for_template(conn, form_id).await?;
    let known: HashSet<&str> = fields.iter().map(|f| f.field_id.as_str()).collect();
    for answer in &request.answers {
        if !known.contains(answer.field_id.as_str()) {
            debug!(field_id = %answer.field_id, form_id, "Skipping unknown field.");
            continue;
        }
        upsert_response(conn, submission_id, answer).await?;
    }

    if let Some(assignment) = find_assignment(conn, patient_id, form_id).await? {
        if status == SubmissionStatus::Completed {
            set_status(conn, patient_id, form_id, AssignmentStatus::Completed).await?;
        }
        let location = request
            .location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if due_date.is_some() || location.is_some() {
            conn.execute(
                "UPDATE form_status SET due_date = ?, location = ? WHERE id = ?",
                Params::Positional(vec![
                    opt_text(due_date.or(assignment.due_date.as_deref())),
                    opt_text(location.or(assignment.location.as_deref())),
                    int(assignment.id),
                ]),
            )
            .await?;
        }
    }

    let responses = responses_for(conn, submission_id).await?;
    Ok(SaveOutcome {
        submission_id,
        completion: completion::completion(&fields, &responses),
    })
}

/// Starts a fresh `In Progress` submission; later reads and saves target it.
pub async fn start_submission(
    db: &Database,
    form_id: i64,
    patient_id: i64,
) -> Result<Submission, IntakeError> {
    let conn = db.connect()?;
    if find_template(&conn, form_id).await?.is_none() {
        return Err(IntakeError::not_found("Form not found"));
    }
    if find_patient(&conn, patient_id).await?.is_none() {
        return Err(IntakeError::not_found("Patient not found"));
    }
    let submission = insert_submission(&conn, form_id, patient_id, SubmissionStatus::InProgress).await?;
    info!(
        form_id,
        patient_id,
        submission_id = submission.submission_id,
        "Started new submission."
    );
    Ok(submission)
}
