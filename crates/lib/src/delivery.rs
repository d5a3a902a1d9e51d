//! # Delivery Tokens
//!
//! A dispatch covers one patient and a batch of templates. It is identified by a single
//! token written onto every assignment of the batch; the public `/fill-form/{token}` link
//! is honoured only while some assignment of the embedded patient carries that exact token.
//!
//! Token layout: `<patientId>-<formIds joined by ",">-<unix seconds>-<random hex>`.

use crate::{
    assignments::{find_assignment, upsert_assignment},
    errors::IntakeError,
    patients::find_patient,
    providers::db::sqlite::{begin, finish, int, opt_text, text, timestamp_now},
    templates::find_template,
    types::AssignmentStatus,
    validation::parse_id,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use turso::{params, params::Params, Connection, Database};
use uuid::Uuid;

/// The batch a delivery token was issued for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedToken {
    pub token: String,
    pub patient_id: i64,
    pub form_ids: Vec<i64>,
    pub first_form_id: i64,
}

impl ResolvedToken {
    /// Whether the token's batch includes `form_id`.
    pub fn covers(&self, form_id: i64) -> bool {
        self.form_ids.contains(&form_id)
    }

    /// The frontend location the public link redirects to.
    ///
    /// The token travels along so the editor can authorise its form reads and saves.
    pub fn form_editor_url(&self, frontend_url: &str) -> String {
        let forms = self
            .form_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "{}/form-editor/{}?patient={}&forms={}&token={}",
            frontend_url.trim_end_matches('/'),
            self.first_form_id,
            self.patient_id,
            forms,
            self.token
        )
    }
}

/// Which delivery stamp a confirmed dispatch writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stamp {
    Email,
    Sms,
    Office,
}

/// Builds a fresh token for a (patient, forms) batch.
pub fn issue_token(patient_id: i64, form_ids: &[i64]) -> String {
    let ids = form_ids
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{patient_id}-{ids}-{}-{}",
        Utc::now().timestamp(),
        Uuid::new_v4().simple()
    )
}

async fn ensure_batch(
    conn: &Connection,
    patient_id: i64,
    form_ids: &[i64],
) -> Result<(), IntakeError> {
    if form_ids.is_empty() {
        return Err(IntakeError::validation("No forms selected"));
    }
    if find_patient(conn, patient_id).await?.is_none() {
        return Err(IntakeError::not_found("Patient not found"));
    }
    for &form_id in form_ids {
        if find_template(conn, form_id).await?.is_none() {
            return Err(IntakeError::not_found(format!("Form {form_id} not found")));
        }
    }
    Ok(())
}

/// Stores `token` on every assignment of the batch, creating missing assignments as `Active`.
///
/// Runs before any transport attempt, so the token is recorded whether or not delivery succeeds.
pub async fn record_token(
    db: &Database,
    patient_id: i64,
    form_ids: &[i64],
    token: &str,
    due_date: Option<&str>,
    location: Option<&str>,
) -> Result<(), IntakeError> {
    let conn = db.connect()?;
    ensure_batch(&conn, patient_id, form_ids).await?;

    begin(&conn).await?;
    let result = write_token(&conn, patient_id, form_ids, token, due_date, location).await;
    finish(&conn, result).await?;
    info!(patient_id, forms = form_ids.len(), "Recorded delivery token.");
    Ok(())
}

async fn write_token(
    conn: &Connection,
    patient_id: i64,
    form_ids: &[i64],
    token: &str,
    due_date: Option<&str>,
    location: Option<&str>,
) -> Result<(), IntakeError> {
    for &form_id in form_ids {
        let id = match find_assignment(conn, patient_id, form_id).await? {
            Some(existing) => existing.id,
            None => {
                upsert_assignment(
                    conn,
                    patient_id,
                    form_id,
                    AssignmentStatus::Active,
                    due_date,
                    location,
                )
                .await?
            }
        };
        conn.execute(
            "UPDATE form_status SET qr = ? WHERE id = ?",
            params![token.to_string(), id],
        )
        .await?;
    }
    Ok(())
}

/// Records a confirmed email delivery: stamps `email_sent` and reactivates the batch.
pub async fn stamp_email_sent(
    db: &Database,
    patient_id: i64,
    form_ids: &[i64],
    due_date: Option<&str>,
    location: Option<&str>,
) -> Result<(), IntakeError> {
    stamp(db, patient_id, form_ids, Stamp::Email, due_date, location).await
}

/// Records a confirmed SMS delivery: stamps `sms_sent` and reactivates the batch.
pub async fn stamp_sms_sent(
    db: &Database,
    patient_id: i64,
    form_ids: &[i64],
    due_date: Option<&str>,
    location: Option<&str>,
) -> Result<(), IntakeError> {
    stamp(db, patient_id, form_ids, Stamp::Sms, due_date, location).await
}

/// In-office delivery has no transport; only due date, location and status are updated.
pub async fn mark_delivered_in_office(
    db: &Database,
    patient_id: i64,
    form_ids: &[i64],
    due_date: Option<&str>,
    location: Option<&str>,
) -> Result<(), IntakeError> {
    stamp(db, patient_id, form_ids, Stamp::Office, due_date, location).await
}

async fn stamp(
    db: &Database,
    patient_id: i64,
    form_ids: &[i64],
    kind: Stamp,
    due_date: Option<&str>,
    location: Option<&str>,
) -> Result<(), IntakeError> {
    let conn = db.connect()?;
    ensure_batch(&conn, patient_id, form_ids).await?;

    begin(&conn).await?;
    let result = write_stamp(&conn, patient_id, form_ids, kind, due_date, location).await;
    finish(&conn, result).await?;
    info!(patient_id, forms = form_ids.len(), channel = ?kind, "Stamped delivery.");
    Ok(())
}

async fn write_stamp(
    conn: &Connection,
    patient_id: i64,
    form_ids: &[i64],
    kind: Stamp,
    due_date: Option<&str>,
    location: Option<&str>,
) -> Result<(), IntakeError> {
    let now = timestamp_now();
    for &form_id in form_ids {
        let id = upsert_assignment(
            conn,
            patient_id,
            form_id,
            AssignmentStatus::Active,
            due_date,
            location,
        )
        .await?;
        let column = match kind {
            Stamp::Email => "email_sent",
            Stamp::Sms => "sms_sent",
            Stamp::Office => continue,
        };
        conn.execute(
            &format!("UPDATE form_status SET {column} = ? WHERE id = ?"),
            Params::Positional(vec![text(&now), int(id)]),
        )
        .await?;
    }
    Ok(())
}

/// Validates a public link token against the stored assignments.
pub async fn resolve_token(db: &Database, token: &str) -> Result<ResolvedToken, IntakeError> {
    let token = token.trim();
    let parts: Vec<&str> = token.split('-').collect();
    if parts.len() < 3 {
        return Err(IntakeError::validation("Invalid token"));
    }
    let patient_id = parse_id(parts[0], "patientId")?;
    let form_ids = parts[1]
        .split(',')
        .map(|raw| parse_id(raw, "formId"))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(&first_form_id) = form_ids.first() else {
        return Err(IntakeError::validation("Invalid token"));
    };

    let conn = db.connect()?;
    let mut rows = conn
        .query(
            "SELECT id FROM form_status WHERE patient_id = ? AND qr = ? LIMIT 1",
            Params::Positional(vec![int(patient_id), opt_text(Some(token))]),
        )
        .await?;
    if rows.next().await?.is_none() {
        warn!(patient_id, "Rejected unknown delivery token.");
        return Err(IntakeError::not_found("Invalid or expired link"));
    }

    Ok(ResolvedToken {
        token: token.to_string(),
        patient_id,
        form_ids,
        first_form_id,
    })
}
