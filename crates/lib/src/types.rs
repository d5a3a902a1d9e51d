//! # Typed Records
//!
//! Every read path shares these shapes, so a patient, an assignment or a submission
//! looks the same whether it comes from the dashboard, the detail view or an export.

use serde::{Deserialize, Serialize};
use std::fmt;

// --- Statuses ---

/// The lifecycle state of an assignment (`form_status.status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Active,
    Completed,
    Archived,
    #[serde(rename = "Not Started")]
    NotStarted,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Active => "Active",
            AssignmentStatus::Completed => "Completed",
            AssignmentStatus::Archived => "Archived",
            AssignmentStatus::NotStarted => "Not Started",
        }
    }

    /// Parses a stored status. Unknown values yield `None` so read paths apply their fallback.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Active" => Some(AssignmentStatus::Active),
            "Completed" => Some(AssignmentStatus::Completed),
            "Archived" => Some(AssignmentStatus::Archived),
            "Not Started" => Some(AssignmentStatus::NotStarted),
            _ => None,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state of one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::InProgress => "In Progress",
            SubmissionStatus::Completed => "Completed",
        }
    }

    /// Reads a client status. `Submitted` is the editor's word for a completed form.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("in progress") {
            Some(SubmissionStatus::InProgress)
        } else if raw.eq_ignore_ascii_case("completed") || raw.eq_ignore_ascii_case("submitted") {
            Some(SubmissionStatus::Completed)
        } else {
            None
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a batch of forms reaches the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    /// Email to the patient. `"patient"` is the name the frontend sends.
    #[default]
    #[serde(rename = "patient", alias = "email")]
    Email,
    Sms,
    Office,
}

impl DeliveryChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryChannel::Email => "patient",
            DeliveryChannel::Sms => "sms",
            DeliveryChannel::Office => "office",
        }
    }
}

// --- Patients ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub created_on: String,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Input for creating or replacing a patient. Values are trimmed and normalised on write.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewPatient {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
}

/// A partial patient update; absent fields keep their stored value.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PatientUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
}

/// A patient search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientMatch {
    pub patient_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<String>,
}

// --- Templates ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormTemplate {
    pub form_id: i64,
    pub form_name: String,
    pub form_url: Option<String>,
    pub created_at: String,
}

/// A template row in listings, with its field count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateSummary {
    pub id: i64,
    pub title: String,
    pub form_url: Option<String>,
    pub field_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormField {
    pub field_id: String,
    pub form_id: i64,
    pub position: i64,
    pub field_label: String,
    pub field_type: String,
    pub is_required: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TemplateWithFields {
    #[serde(flatten)]
    pub template: FormTemplate,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub form_url: Option<String>,
    #[serde(default)]
    pub fields: Vec<NewField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewField {
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_field_type", rename = "type", alias = "field_type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
}

fn default_field_type() -> String {
    "text".to_string()
}

// --- Assignments ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub id: i64,
    pub patient_id: i64,
    pub form_id: i64,
    pub status: Option<AssignmentStatus>,
    pub due_date: Option<String>,
    pub location: Option<String>,
    pub email_sent: Option<String>,
    pub sms_sent: Option<String>,
    /// The delivery token of the last dispatch that covered this assignment.
    pub token: Option<String>,
    pub created: String,
}

/// A request to attach templates to a patient.
#[derive(Debug, Clone, Default)]
pub struct AssignRequest {
    pub patient_id: Option<i64>,
    pub form_ids: Vec<i64>,
    pub due_date: Option<String>,
    pub location: Option<String>,
}

// --- Submissions ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub submission_id: i64,
    pub form_id: i64,
    pub patient_id: i64,
    pub status: SubmissionStatus,
    pub submitted_at: String,
}

/// One answer within a submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub submission_id: i64,
    pub field_id: String,
    pub response_value: Option<String>,
}

/// A single answer in a save request.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAnswer {
    pub field_id: String,
    pub value: Option<String>,
}

/// The payload of a save/submit operation.
#[derive(Debug, Clone, Default)]
pub struct SaveSubmission {
    pub answers: Vec<FieldAnswer>,
    /// Defaults to `Completed` when absent.
    pub status: Option<SubmissionStatus>,
    pub due_date: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub submission_id: i64,
    pub completion: f64,
}

// --- Appointments & locations ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: Option<i64>,
    pub patient_name: String,
    pub patient_email: String,
    pub phone_number: String,
    pub date: String,
    pub time: String,
    pub doctor: String,
    pub status: String,
    pub submitted_at: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    #[serde(default)]
    pub patient_id: Option<i64>,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub patient_email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub appointment_date: String,
    #[serde(default)]
    pub appointment_time: String,
    #[serde(default)]
    pub specialist: String,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub upcoming: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub timezone: Option<String>,
    pub schedule_start: Option<String>,
    pub schedule_end: Option<String>,
    pub address: Option<String>,
    pub apartment_suite: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub is_active: bool,
    pub created_on: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LocationInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub schedule_start: Option<String>,
    #[serde(default)]
    pub schedule_end: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub apartment_suite: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// A staff profile with the names of its assigned locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaffMember {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_phone: Option<String>,
    pub role_group: String,
    pub default_location: Option<String>,
    pub locations: Vec<String>,
    pub is_active: bool,
    pub created_on: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStaffMember {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "phone")]
    pub mobile_phone: String,
    #[serde(default)]
    pub role_group: String,
    #[serde(default)]
    pub default_location: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub location_ids: Vec<i64>,
}

/// A profile edit. First name and email are always required; `None` keeps the other values.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StaffUpdate {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, alias = "phone")]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub role_group: Option<String>,
    #[serde(default)]
    pub default_location: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub location_ids: Option<Vec<i64>>,
}

fn default_true() -> bool {
    true
}
