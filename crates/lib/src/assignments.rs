//! # Assignment Writer
//!
//! Attaches templates to patients. There is at most one `form_status` row per
//! (patient, form); writing an existing pair updates it in place.

use crate::{
    errors::IntakeError,
    patients::find_patient,
    providers::db::sqlite::{
        begin, finish, get_i64, get_opt_text, get_text, int, opt_text, text, timestamp_now,
    },
    templates::find_template,
    types::{AssignRequest, Assignment, AssignmentStatus},
    validation::parse_optional_date,
};
use tracing::{debug, info};
use turso::{params, params::Params, Connection, Database, Row, Value as TursoValue};

pub(crate) const ASSIGNMENT_COLUMNS: &str =
    "id, patient_id, form_id, status, due_date, location, email_sent, sms_sent, qr, created";

impl TryFrom<&Row> for Assignment {
    type Error = IntakeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Assignment {
            id: get_i64(row, 0)?,
            patient_id: get_i64(row, 1)?,
            form_id: get_i64(row, 2)?,
            status: get_opt_text(row, 3)?.and_then(|s| AssignmentStatus::parse(&s)),
            due_date: get_opt_text(row, 4)?,
            location: get_opt_text(row, 5)?,
            email_sent: get_opt_text(row, 6)?,
            sms_sent: get_opt_text(row, 7)?,
            token: get_opt_text(row, 8)?,
            created: get_text(row, 9)?,
        })
    }
}

pub(crate) async fn find_assignment(
    conn: &Connection,
    patient_id: i64,
    form_id: i64,
) -> Result<Option<Assignment>, IntakeError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM form_status WHERE patient_id = ? AND form_id = ?"
            ),
            params![patient_id, form_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(Assignment::try_from(&row)?)),
        None => Ok(None),
    }
}

/// Every assignment, newest first.
pub(crate) async fn all_assignments(conn: &Connection) -> Result<Vec<Assignment>, IntakeError> {
    let mut rows = conn
        .query(
            &format!("SELECT {ASSIGNMENT_COLUMNS} FROM form_status ORDER BY created DESC, id DESC"),
            (),
        )
        .await?;
    let mut assignments = Vec::new();
    while let Some(row) = rows.next().await? {
        assignments.push(Assignment::try_from(&row)?);
    }
    Ok(assignments)
}

/// The assignments of one patient in creation order.
pub(crate) async fn assignments_for_patient(
    conn: &Connection,
    patient_id: i64,
) -> Result<Vec<Assignment>, IntakeError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {ASSIGNMENT_COLUMNS} FROM form_status WHERE patient_id = ? ORDER BY created ASC, id ASC"
            ),
            params![patient_id],
        )
        .await?;
    let mut assignments = Vec::new();
    while let Some(row) = rows.next().await? {
        assignments.push(Assignment::try_from(&row)?);
    }
    Ok(assignments)
}

/// Inserts or updates the (patient, form) assignment with the given status, due date and location.
///
/// Returns the id of the assignment row.
pub(crate) async fn upsert_assignment(
    conn: &Connection,
    patient_id: i64,
    form_id: i64,
    status: AssignmentStatus,
    due_date: Option<&str>,
    location: Option<&str>,
) -> Result<i64, IntakeError> {
    if let Some(existing) = find_assignment(conn, patient_id, form_id).await? {
        conn.execute(
            "UPDATE form_status SET status = ?, due_date = ?, location = ? WHERE id = ?",
            Params::Positional(vec![
                text(status.as_str()),
                opt_text(due_date),
                opt_text(location),
                int(existing.id),
            ]),
        )
        .await?;
        debug!(patient_id, form_id, "Updated existing assignment.");
        return Ok(existing.id);
    }

    let mut rows = conn
        .query(
            "INSERT INTO form_status (patient_id, form_id, status, due_date, location, created)
             VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
            Params::Positional(vec![
                int(patient_id),
                int(form_id),
                text(status.as_str()),
                opt_text(due_date),
                opt_text(location),
                text(&timestamp_now()),
            ]),
        )
        .await?;
    let id = match rows.next().await? {
        Some(row) => get_i64(&row, 0)?,
        None => {
            return Err(IntakeError::DataIntegrity(
                "Insert into form_status returned no id".to_string(),
            ))
        }
    };
    debug!(patient_id, form_id, "Inserted new assignment.");
    Ok(id)
}

/// Sets only the status of an existing assignment. Returns `false` when there is none.
pub(crate) async fn set_status(
    conn: &Connection,
    patient_id: i64,
    form_id: i64,
    status: AssignmentStatus,
) -> Result<bool, IntakeError> {
    let affected = conn
        .execute(
            "UPDATE form_status SET status = ? WHERE patient_id = ? AND form_id = ?",
            params![status.as_str(), patient_id, form_id],
        )
        .await?;
    Ok(affected > 0)
}

/// Ensures exactly one `Active` assignment exists for each requested template.
///
/// The request is validated before any row is touched, and the batch is written in
/// one transaction: an unknown template id rolls back the whole call.
pub async fn assign_forms(
    db: &Database,
    request: AssignRequest,
    default_location: &str,
) -> Result<usize, IntakeError> {
    let patient_id = match request.patient_id {
        Some(id) if !request.form_ids.is_empty() => id,
        _ => return Err(IntakeError::validation("Missing patientId or formIds")),
    };
    let due_date = parse_optional_date(request.due_date.as_deref())?;
    let location = request
        .location
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_location)
        .to_string();

    let conn = db.connect()?;
    if find_patient(&conn, patient_id).await?.is_none() {
        return Err(IntakeError::not_found("Patient not found"));
    }

    begin(&conn).await?;
    let result = write_batch(
        &conn,
        patient_id,
        &request.form_ids,
        due_date.as_deref(),
        &location,
    )
    .await;
    let count = finish(&conn, result).await?;

    info!(patient_id, forms = count, "Assigned forms to patient.");
    Ok(count)
}

async fn write_batch(
    conn: &Connection,
    patient_id: i64,
    form_ids: &[i64],
    due_date: Option<&str>,
    location: &str,
) -> Result<usize, IntakeError> {
    for &form_id in form_ids {
        if find_template(conn, form_id).await?.is_none() {
            return Err(IntakeError::not_found(format!("Form {form_id} not found")));
        }
        upsert_assignment(
            conn,
            patient_id,
            form_id,
            AssignmentStatus::Active,
            due_date,
            Some(location),
        )
        .await?;
    }
    Ok(form_ids.len())
}

/// Moves every assignment of the given patients to `Archived`, whatever its state.
pub async fn archive_patients(db: &Database, patient_ids: &[i64]) -> Result<u64, IntakeError> {
    bulk_status(db, patient_ids, AssignmentStatus::Archived, None).await
}

/// Moves the archived assignments of the given patients back to `Active`.
pub async fn unarchive_patients(db: &Database, patient_ids: &[i64]) -> Result<u64, IntakeError> {
    bulk_status(
        db,
        patient_ids,
        AssignmentStatus::Active,
        Some(AssignmentStatus::Archived),
    )
    .await
}

async fn bulk_status(
    db: &Database,
    patient_ids: &[i64],
    to: AssignmentStatus,
    only_from: Option<AssignmentStatus>,
) -> Result<u64, IntakeError> {
    if patient_ids.is_empty() {
        return Err(IntakeError::validation("No patientIds provided"));
    }
    let placeholders = vec!["?"; patient_ids.len()].join(", ");
    let mut sql = format!("UPDATE form_status SET status = ? WHERE patient_id IN ({placeholders})");
    let mut values: Vec<TursoValue> = vec![text(to.as_str())];
    values.extend(patient_ids.iter().map(|id| int(*id)));
    if let Some(from) = only_from {
        sql.push_str(" AND status = ?");
        values.push(text(from.as_str()));
    }

    let conn = db.connect()?;
    let affected = conn.execute(&sql, Params::Positional(values)).await?;
    info!(patients = patient_ids.len(), rows = affected, status = %to, "Bulk status change.");
    Ok(affected)
}
