//! # Appointments
//!
//! Booking, listing, postponing and cancelling appointments. A slot is the combination
//! of date, time and specialist; the specialist is compared case-insensitively.

use crate::{
    errors::IntakeError,
    patients::find_patient,
    providers::db::sqlite::{get_i64, get_opt_text, get_text, int, opt_text, text, timestamp_now},
    types::{Appointment, AppointmentFilter, NewAppointment},
    validation::{non_blank, parse_date, parse_time},
};
use chrono::Utc;
use tracing::info;
use turso::{params, params::Params, Connection, Database, Row, Value as TursoValue};

pub const PENDING: &str = "Pending";

const APPOINTMENT_COLUMNS: &str = "id, patient_id, patient_name, patient_email, phone_number, \
     appointment_date, appointment_time, specialist, status, submitted_at";

impl TryFrom<&Row> for Appointment {
    type Error = IntakeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        let patient_id = match get_opt_text(row, 1)? {
            Some(_) => Some(get_i64(row, 1)?),
            None => None,
        };
        Ok(Appointment {
            id: get_i64(row, 0)?,
            patient_id,
            patient_name: get_text(row, 2)?,
            patient_email: get_text(row, 3)?,
            phone_number: get_text(row, 4)?,
            date: get_text(row, 5)?,
            time: get_text(row, 6)?,
            doctor: get_text(row, 7)?,
            status: get_opt_text(row, 8)?.unwrap_or_else(|| PENDING.to_string()),
            submitted_at: get_text(row, 9)?,
        })
    }
}

async fn find_appointment(
    conn: &Connection,
    id: i64,
) -> Result<Option<Appointment>, IntakeError> {
    let mut rows = conn
        .query(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?"),
            params![id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(Appointment::try_from(&row)?)),
        None => Ok(None),
    }
}

/// Fails with `Conflict` when another appointment holds the slot.
async fn ensure_slot_free(
    conn: &Connection,
    date: &str,
    time: &str,
    specialist: &str,
    except_id: Option<i64>,
) -> Result<(), IntakeError> {
    let mut rows = conn
        .query(
            "SELECT id FROM appointments
             WHERE appointment_date = ? AND appointment_time = ? AND LOWER(specialist) = LOWER(?)",
            Params::Positional(vec![text(date), text(time), text(specialist)]),
        )
        .await?;
    while let Some(row) = rows.next().await? {
        if Some(get_i64(&row, 0)?) != except_id {
            return Err(IntakeError::Conflict(
                "This time slot is already booked for the selected specialist".to_string(),
            ));
        }
    }
    Ok(())
}

fn required(value: &str) -> Option<String> {
    non_blank(Some(value))
}

/// Books an appointment with status `Pending`.
pub async fn book_appointment(
    db: &Database,
    input: NewAppointment,
) -> Result<Appointment, IntakeError> {
    let (Some(name), Some(email), Some(phone), Some(raw_date), Some(raw_time), Some(specialist)) = (
        required(&input.patient_name),
        required(&input.patient_email),
        required(&input.phone_number),
        required(&input.appointment_date),
        required(&input.appointment_time),
        required(&input.specialist),
    ) else {
        return Err(IntakeError::validation("All fields are required"));
    };
    let date = parse_date(&raw_date)?;
    let time = parse_time(&raw_time)?;
    let email = email.to_lowercase();

    let conn = db.connect()?;
    if let Some(patient_id) = input.patient_id {
        if find_patient(&conn, patient_id).await?.is_none() {
            return Err(IntakeError::not_found("Patient not found"));
        }
    }
    ensure_slot_free(&conn, &date, &time, &specialist, None).await?;

    let patient_id = match input.patient_id {
        Some(id) => int(id),
        None => TursoValue::Null,
    };
    let mut rows = conn
        .query(
            "INSERT INTO appointments (patient_id, patient_name, patient_email, phone_number,
                 appointment_date, appointment_time, specialist, status, submitted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
            Params::Positional(vec![
                patient_id,
                text(&name),
                text(&email),
                text(&phone),
                text(&date),
                text(&time),
                text(&specialist),
                text(PENDING),
                text(&timestamp_now()),
            ]),
        )
        .await?;
    let id = match rows.next().await? {
        Some(row) => get_i64(&row, 0)?,
        None => {
            return Err(IntakeError::DataIntegrity(
                "Insert into appointments returned no id".to_string(),
            ))
        }
    };
    drop(rows);
    info!(appointment_id = id, date = %date, time = %time, "Booked appointment.");

    find_appointment(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::DataIntegrity(format!("Appointment {id} vanished after insert")))
}

/// Lists appointments ordered by date then time.
///
/// Name, email and phone filters are OR-combined; a name matches exactly or as a prefix.
/// With `upcoming`, only appointments from today on are returned.
pub async fn list_appointments(
    db: &Database,
    filter: AppointmentFilter,
) -> Result<Vec<Appointment>, IntakeError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<TursoValue> = Vec::new();

    let mut any_of: Vec<&str> = Vec::new();
    if let Some(name) = non_blank(filter.name.as_deref()) {
        // Literal prefix comparison, so `%` and `_` in the name have no special meaning.
        let name = name.to_lowercase();
        any_of.push("substr(LOWER(patient_name), 1, ?) = ?");
        values.push(int(name.chars().count() as i64));
        values.push(text(&name));
    }
    if let Some(email) = non_blank(filter.email.as_deref()) {
        any_of.push("LOWER(patient_email) = ?");
        values.push(text(&email.to_lowercase()));
    }
    if let Some(phone) = non_blank(filter.phone.as_deref()) {
        any_of.push("phone_number = ?");
        values.push(text(&phone));
    }
    if !any_of.is_empty() {
        clauses.push(format!("({})", any_of.join(" OR ")));
    }
    if filter.upcoming {
        clauses.push("appointment_date >= ?".to_string());
        values.push(text(&Utc::now().format("%Y-%m-%d").to_string()));
    }

    let mut sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY appointment_date ASC, appointment_time ASC, id ASC");

    let conn = db.connect()?;
    let mut rows = conn.query(&sql, Params::Positional(values)).await?;
    let mut appointments = Vec::new();
    while let Some(row) = rows.next().await? {
        appointments.push(Appointment::try_from(&row)?);
    }
    Ok(appointments)
}

/// Moves an appointment to a new slot and returns the updated record.
pub async fn postpone_appointment(
    db: &Database,
    id: i64,
    new_date: Option<&str>,
    new_time: Option<&str>,
) -> Result<Appointment, IntakeError> {
    let (Some(raw_date), Some(raw_time)) = (non_blank(new_date), non_blank(new_time)) else {
        return Err(IntakeError::validation("New date and time are required"));
    };
    let date = parse_date(&raw_date)?;
    let time = parse_time(&raw_time)?;

    let conn = db.connect()?;
    let existing = find_appointment(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::not_found("Appointment not found"))?;
    ensure_slot_free(&conn, &date, &time, &existing.doctor, Some(id)).await?;

    conn.execute(
        "UPDATE appointments SET appointment_date = ?, appointment_time = ? WHERE id = ?",
        params![date.clone(), time.clone(), id],
    )
    .await?;
    info!(appointment_id = id, date = %date, time = %time, "Postponed appointment.");

    Ok(Appointment {
        date,
        time,
        ..existing
    })
}

/// Cancels an appointment by deleting it.
pub async fn delete_appointment(db: &Database, id: i64) -> Result<(), IntakeError> {
    let conn = db.connect()?;
    let affected = conn
        .execute("DELETE FROM appointments WHERE id = ?", params![id])
        .await?;
    if affected == 0 {
        return Err(IntakeError::not_found("Appointment not found"));
    }
    info!(appointment_id = id, "Deleted appointment.");
    Ok(())
}

/// The appointments of one patient: linked by id, or booked with the patient's email.
pub async fn customer_appointments(
    db: &Database,
    patient_id: i64,
) -> Result<Vec<Appointment>, IntakeError> {
    let conn = db.connect()?;
    let patient = find_patient(&conn, patient_id)
        .await?
        .ok_or_else(|| IntakeError::not_found("Patient not found"))?;
    let email = patient.email.map(|e| e.to_lowercase());

    let mut rows = conn
        .query(
            &format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 WHERE patient_id = ? OR (? IS NOT NULL AND LOWER(patient_email) = ?)
                 ORDER BY appointment_date ASC, appointment_time ASC, id ASC"
            ),
            Params::Positional(vec![
                int(patient_id),
                opt_text(email.as_deref()),
                opt_text(email.as_deref()),
            ]),
        )
        .await?;
    let mut appointments = Vec::new();
    while let Some(row) = rows.next().await? {
        appointments.push(Appointment::try_from(&row)?);
    }
    Ok(appointments)
}
