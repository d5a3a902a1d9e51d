//! # Patients
//!
//! Registration and maintenance of patient identity records.

use crate::{
    errors::IntakeError,
    providers::db::sqlite::{get_i64, get_opt_text, get_text, int, opt_text, text, timestamp_now},
    types::{NewPatient, Patient, PatientMatch, PatientUpdate},
    validation::{non_blank, normalize_phone, parse_optional_date},
};
use tracing::info;
use turso::{params, params::Params, Connection, Database, Row};

const PATIENT_COLUMNS: &str = "id, first_name, last_name, email, phone, dob, created_on";

impl TryFrom<&Row> for Patient {
    type Error = IntakeError;

    fn try_from(row: &Row) -> Result<Self, Self::Error> {
        Ok(Patient {
            id: get_i64(row, 0)?,
            first_name: get_text(row, 1)?,
            last_name: get_text(row, 2)?,
            email: get_opt_text(row, 3)?,
            phone: get_opt_text(row, 4)?,
            dob: get_opt_text(row, 5)?,
            created_on: get_text(row, 6)?,
        })
    }
}

/// Looks up a patient on an existing connection.
pub(crate) async fn find_patient(
    conn: &Connection,
    patient_id: i64,
) -> Result<Option<Patient>, IntakeError> {
    let mut rows = conn
        .query(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?"),
            params![patient_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(Patient::try_from(&row)?)),
        None => Ok(None),
    }
}

pub async fn create_patient(db: &Database, input: NewPatient) -> Result<Patient, IntakeError> {
    let first_name = input.first_name.trim().to_string();
    let last_name = input.last_name.trim().to_string();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(IntakeError::validation(
            "first_name and last_name are required",
        ));
    }
    let dob = parse_optional_date(input.dob.as_deref())?;
    let email = non_blank(input.email.as_deref());
    let phone = normalize_phone(input.phone.as_deref());

    let conn = db.connect()?;
    let mut rows = conn
        .query(
            "INSERT INTO patients (first_name, last_name, email, phone, dob, created_on) VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
            Params::Positional(vec![
                text(&first_name),
                text(&last_name),
                opt_text(email.as_deref()),
                opt_text(phone.as_deref()),
                opt_text(dob.as_deref()),
                text(&timestamp_now()),
            ]),
        )
        .await?;
    let id = match rows.next().await? {
        Some(row) => get_i64(&row, 0)?,
        None => {
            return Err(IntakeError::DataIntegrity(
                "Insert into patients returned no id".to_string(),
            ))
        }
    };
    drop(rows);
    info!(patient_id = id, "Created patient.");

    find_patient(&conn, id)
        .await?
        .ok_or_else(|| IntakeError::DataIntegrity(format!("Patient {id} vanished after insert")))
}

pub async fn get_patient(db: &Database, patient_id: i64) -> Result<Patient, IntakeError> {
    let conn = db.connect()?;
    find_patient(&conn, patient_id)
        .await?
        .ok_or_else(|| IntakeError::not_found("Patient not found"))
}

/// All patients, newest first.
pub async fn list_patients(db: &Database) -> Result<Vec<Patient>, IntakeError> {
    let conn = db.connect()?;
    all_patients(&conn).await
}

pub(crate) async fn all_patients(conn: &Connection) -> Result<Vec<Patient>, IntakeError> {
    let mut rows = conn
        .query(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY created_on DESC, id DESC"),
            (),
        )
        .await?;
    let mut patients = Vec::new();
    while let Some(row) = rows.next().await? {
        patients.push(Patient::try_from(&row)?);
    }
    Ok(patients)
}

pub async fn update_patient(
    db: &Database,
    patient_id: i64,
    update: PatientUpdate,
) -> Result<Patient, IntakeError> {
    let conn = db.connect()?;
    let mut patient = find_patient(&conn, patient_id)
        .await?
        .ok_or_else(|| IntakeError::not_found("Patient not found"))?;

    if let Some(first_name) = update.first_name {
        patient.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = update.last_name {
        patient.last_name = last_name.trim().to_string();
    }
    if patient.first_name.is_empty() || patient.last_name.is_empty() {
        return Err(IntakeError::validation(
            "first_name and last_name must not be empty",
        ));
    }
    if let Some(email) = update.email {
        patient.email = non_blank(Some(&email));
    }
    if let Some(phone) = update.phone {
        patient.phone = normalize_phone(Some(&phone));
    }
    if let Some(dob) = update.dob {
        patient.dob = parse_optional_date(Some(&dob))?;
    }

    conn.execute(
        "UPDATE patients SET first_name = ?, last_name = ?, email = ?, phone = ?, dob = ? WHERE id = ?",
        Params::Positional(vec![
            text(&patient.first_name),
            text(&patient.last_name),
            opt_text(patient.email.as_deref()),
            opt_text(patient.phone.as_deref()),
            opt_text(patient.dob.as_deref()),
            int(patient_id),
        ]),
    )
    .await?;
    info!(patient_id, "Updated patient.");
    Ok(patient)
}

/// Irreversibly removes a patient row. Assignments and submissions stay as history.
pub async fn delete_patient(db: &Database, patient_id: i64) -> Result<(), IntakeError> {
    let conn = db.connect()?;
    let affected = conn
        .execute("DELETE FROM patients WHERE id = ?", params![patient_id])
        .await?;
    if affected == 0 {
        return Err(IntakeError::not_found("Patient not found"));
    }
    info!(patient_id, "Deleted patient.");
    Ok(())
}

/// Case-insensitive search over name, email and phone. A blank term matches nothing.
pub async fn search_patients(db: &Database, term: &str) -> Result<Vec<PatientMatch>, IntakeError> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    let needle = term.to_lowercase();

    let conn = db.connect()?;
    let mut rows = conn
        .query(
            "SELECT id, first_name, last_name, email, phone, dob FROM patients
             WHERE instr(LOWER(first_name), ?1) > 0 OR instr(LOWER(last_name), ?1) > 0
                OR instr(LOWER(COALESCE(email, '')), ?1) > 0 OR instr(COALESCE(phone, ''), ?1) > 0
             ORDER BY first_name ASC LIMIT 25",
            params![needle],
        )
        .await?;

    let mut matches = Vec::new();
    while let Some(row) = rows.next().await? {
        let first = get_text(&row, 1)?;
        let last = get_text(&row, 2)?;
        matches.push(PatientMatch {
            patient_id: get_i64(&row, 0)?,
            name: format!("{first} {last}").trim().to_string(),
            email: get_opt_text(&row, 3)?,
            phone: get_opt_text(&row, 4)?,
            dob: get_opt_text(&row, 5)?,
        });
    }
    Ok(matches)
}
