//! # SQLite Schema
//!
//! This module centralizes the table definitions for the intake database.
//! Every statement is idempotent so the schema can be applied on each startup.

pub const CREATE_PATIENTS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS patients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        dob TEXT,
        created_on TEXT NOT NULL
    );
";

pub const CREATE_FORMS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS forms (
        form_id INTEGER PRIMARY KEY AUTOINCREMENT,
        form_name TEXT NOT NULL,
        form_url TEXT,
        created_at TEXT NOT NULL
    );
";

/// Field ids are `<form_id>.<position>` strings, stable for the life of the template.
pub const CREATE_FORM_FIELDS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS form_fields (
        field_id TEXT PRIMARY KEY,
        form_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        field_label TEXT NOT NULL,
        field_type TEXT NOT NULL,
        is_required INTEGER NOT NULL DEFAULT 0
    );
";

/// One assignment per (patient, form).
pub const CREATE_FORM_STATUS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS form_status (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER NOT NULL,
        form_id INTEGER NOT NULL,
        status TEXT,
        due_date TEXT,
        location TEXT,
        email_sent TEXT,
        sms_sent TEXT,
        qr TEXT,
        created TEXT NOT NULL,
        UNIQUE(patient_id, form_id)
    );
";

pub const CREATE_FORM_SUBMISSIONS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS form_submissions (
        submission_id INTEGER PRIMARY KEY AUTOINCREMENT,
        form_id INTEGER NOT NULL,
        patient_id INTEGER NOT NULL,
        status TEXT NOT NULL,
        submitted_at TEXT NOT NULL
    );
";

/// One response per (submission, field).
pub const CREATE_FORM_RESPONSES_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS form_responses (
        response_id INTEGER PRIMARY KEY AUTOINCREMENT,
        submission_id INTEGER NOT NULL,
        field_id TEXT NOT NULL,
        response_value TEXT,
        UNIQUE(submission_id, field_id)
    );
";

/// `patient_id` is optional: public bookings are matched to patients by email.
pub const CREATE_APPOINTMENTS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS appointments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id INTEGER,
        patient_name TEXT NOT NULL,
        patient_email TEXT NOT NULL,
        phone_number TEXT NOT NULL,
        appointment_date TEXT NOT NULL,
        appointment_time TEXT NOT NULL,
        specialist TEXT NOT NULL,
        status TEXT,
        submitted_at TEXT NOT NULL
    );
";

pub const CREATE_LOCATIONS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS locations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        phone TEXT,
        timezone TEXT,
        schedule_start TEXT,
        schedule_end TEXT,
        address TEXT,
        apartment_suite TEXT,
        city TEXT,
        state TEXT,
        zip_code TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_on TEXT NOT NULL
    );
";

/// Staff profiles managed by administrators.
pub const CREATE_STAFF_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS staff (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        mobile_phone TEXT,
        role_group TEXT NOT NULL,
        default_location TEXT,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_on TEXT NOT NULL
    );
";

pub const CREATE_STAFF_LOCATIONS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS staff_locations (
        staff_id INTEGER NOT NULL,
        location_id INTEGER NOT NULL,
        UNIQUE(staff_id, location_id)
    );
";

/// Staff accounts, keyed by a deterministic UUIDv5 of their login identifier.
pub const CREATE_USERS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        role TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
";

/// Tokens invalidated by logout, kept until their own expiry.
pub const CREATE_REVOKED_TOKENS_TABLE_SQL: &str = "
    CREATE TABLE IF NOT EXISTS revoked_tokens (
        token TEXT PRIMARY KEY,
        expires_at TEXT NOT NULL,
        revoked_at TEXT NOT NULL
    );
";

pub const ALL_TABLE_CREATION_SQL: &[&str] = &[
    CREATE_PATIENTS_TABLE_SQL,
    CREATE_FORMS_TABLE_SQL,
    CREATE_FORM_FIELDS_TABLE_SQL,
    CREATE_FORM_STATUS_TABLE_SQL,
    CREATE_FORM_SUBMISSIONS_TABLE_SQL,
    CREATE_FORM_RESPONSES_TABLE_SQL,
    CREATE_APPOINTMENTS_TABLE_SQL,
    CREATE_LOCATIONS_TABLE_SQL,
    CREATE_STAFF_TABLE_SQL,
    CREATE_STAFF_LOCATIONS_TABLE_SQL,
    CREATE_USERS_TABLE_SQL,
    CREATE_REVOKED_TOKENS_TABLE_SQL,
];
