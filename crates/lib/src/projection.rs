//! # Read Projection
//!
//! Flattens patients, assignments, the latest submission of each (form, patient) pair
//! and the templates into the shapes the dashboard and the form views consume.
//!
//! The dashboards read everything through [`Snapshot`]; the single-patient views query
//! only that patient's rows. Both paths share one latest-submission rule and one
//! completion formula.

use crate::{
    assignments::{all_assignments, assignments_for_patient, find_assignment},
    completion,
    errors::IntakeError,
    patients::{all_patients, find_patient},
    submissions::{latest_submission, latest_submissions, responses_for, responses_for_many},
    templates::{all_fields, all_templates, fields_for_template, find_template},
    types::{Assignment, FormField, FormTemplate, Patient, Submission, SubmissionStatus},
};
use serde::Serialize;
use std::collections::HashMap;
use turso::{Connection, Database};

/// Status shown for an assignment without a recorded status in flat listings.
pub const FALLBACK_FLAT_STATUS: &str = "Not Started";
/// Status shown in the grouped view for a patient without assignments, or a form without status.
pub const NOT_ASSIGNED: &str = "Not Assigned";
pub const ASSIGNED: &str = "Assigned";
/// Form name shown in the flat view for a patient without assignments.
pub const NO_FORM_ASSIGNED: &str = "No Form Assigned";

// --- Row shapes ---

/// A template field together with the current answer of the viewed patient.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldWithResponse {
    pub field_id: String,
    pub form_id: i64,
    pub position: i64,
    pub field_label: String,
    pub field_type: String,
    pub is_required: bool,
    pub response_value: Option<String>,
}

/// A template as seen by one patient (or blank, without a patient).
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormDetail {
    pub form_id: i64,
    pub title: String,
    pub form_url: Option<String>,
    pub patient_id: Option<i64>,
    pub patient_name: Option<String>,
    pub dob: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub location: Option<String>,
    pub submission_id: Option<i64>,
    pub submission_status: Option<SubmissionStatus>,
    pub submitted_at: Option<String>,
    pub completion: f64,
    pub fields: Vec<FieldWithResponse>,
}

/// One assigned form of a patient.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientFormRow {
    pub form_id: i64,
    pub form_name: String,
    pub status: String,
    pub due_date: Option<String>,
    pub location: Option<String>,
    pub submitted_at: Option<String>,
    pub total_fields: usize,
    pub answered_fields: usize,
    pub completion: f64,
}

/// A row of the flat dashboard: one per (patient, assignment), or one per unassigned patient.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardRow {
    pub patient_id: i64,
    pub patient: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub patient_created_on: String,
    pub form_id: Option<i64>,
    pub form: String,
    pub status: String,
    pub due_date: Option<String>,
    pub location: Option<String>,
    pub email_sent: Option<String>,
    pub sms_sent: Option<String>,
    pub created: Option<String>,
    pub submitted_at: Option<String>,
    pub completion: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupedForm {
    pub form_id: i64,
    pub form: String,
    pub status: String,
    pub due_date: Option<String>,
    pub location: Option<String>,
    pub email_sent: Option<String>,
    pub sms_sent: Option<String>,
    pub created: String,
    pub submitted_at: Option<String>,
    pub completion: f64,
}

/// A patient of the grouped dashboard with all their assigned forms.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientGroup {
    pub patient_id: i64,
    pub patient: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub created_on: String,
    pub status: String,
    pub forms: Vec<GroupedForm>,
}

// --- Snapshot ---

/// Everything the list views need, read on a single connection.
pub(crate) struct Snapshot {
    /// Newest first.
    pub patients: Vec<Patient>,
    pub templates: HashMap<i64, FormTemplate>,
    pub fields: HashMap<i64, Vec<FormField>>,
    /// Newest first.
    pub assignments: Vec<Assignment>,
    pub latest: HashMap<(i64, i64), Submission>,
    pub responses: HashMap<i64, HashMap<String, Option<String>>>,
}

/// The current submission of a pair, and how far it is filled in.
pub(crate) struct Progress<'a> {
    pub submission: Option<&'a Submission>,
    pub total: usize,
    pub answered: usize,
    pub completion: f64,
}

impl Snapshot {
    pub(crate) async fn load(conn: &Connection) -> Result<Self, IntakeError> {
        let patients = all_patients(conn).await?;
        let templates = all_templates(conn).await?;
        let fields = all_fields(conn).await?;
        let assignments = all_assignments(conn).await?;
        let latest = latest_submissions(conn).await?;
        let ids: Vec<i64> = latest.values().map(|s| s.submission_id).collect();
        let responses = responses_for_many(conn, &ids).await?;
        Ok(Snapshot {
            patients,
            templates,
            fields,
            assignments,
            latest,
            responses,
        })
    }

    pub(crate) fn form_name(&self, form_id: i64) -> String {
        self.templates
            .get(&form_id)
            .map(|t| t.form_name.clone())
            .unwrap_or_else(|| format!("Form {form_id}"))
    }

    pub(crate) fn fields_of(&self, form_id: i64) -> &[FormField] {
        self.fields.get(&form_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn responses_of(&self, submission_id: i64) -> Option<&HashMap<String, Option<String>>> {
        self.responses.get(&submission_id)
    }

    pub(crate) fn progress(&self, form_id: i64, patient_id: i64) -> Progress<'_> {
        let fields = self.fields_of(form_id);
        let submission = self.latest.get(&(form_id, patient_id));
        let empty = HashMap::new();
        let responses = submission
            .and_then(|s| self.responses_of(s.submission_id))
            .unwrap_or(&empty);
        Progress {
            submission,
            total: fields.len(),
            answered: answered_count(fields, responses),
            completion: completion::completion(fields, responses),
        }
    }

    /// Assignments grouped by patient, each group in creation order.
    pub(crate) fn assignments_by_patient(&self) -> HashMap<i64, Vec<&Assignment>> {
        let mut grouped: HashMap<i64, Vec<&Assignment>> = HashMap::new();
        for assignment in self.assignments.iter().rev() {
            grouped
                .entry(assignment.patient_id)
                .or_default()
                .push(assignment);
        }
        grouped
    }
}

fn answered_count(fields: &[FormField], responses: &HashMap<String, Option<String>>) -> usize {
    fields
        .iter()
        .filter(|f| {
            responses
                .get(&f.field_id)
                .is_some_and(|v| completion::is_answered(v.as_deref()))
        })
        .count()
}

fn status_or(assignment: &Assignment, fallback: &str) -> String {
    assignment
        .status
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

// --- Views ---

/// A template with its fields and, when `patient_id` is given, that patient's current
/// answers, assignment state and completion.
pub async fn form_detail(
    db: &Database,
    form_id: i64,
    patient_id: Option<i64>,
) -> Result<FormDetail, IntakeError> {
    let conn = db.connect()?;
    let template = find_template(&conn, form_id)
        .await?
        .ok_or_else(|| IntakeError::not_found("Form not found"))?;
    let fields = fields_for_template(&conn, form_id).await?;

    let mut detail = FormDetail {
        form_id,
        title: template.form_name,
        form_url: template.form_url,
        patient_id,
        patient_name: None,
        dob: None,
        status: None,
        due_date: None,
        location: None,
        submission_id: None,
        submission_status: None,
        submitted_at: None,
        completion: 0.0,
        fields: Vec::new(),
    };

    let mut responses = HashMap::new();
    if let Some(patient_id) = patient_id {
        let patient = find_patient(&conn, patient_id)
            .await?
            .ok_or_else(|| IntakeError::not_found("Patient not found"))?;
        detail.patient_name = Some(patient.full_name());
        detail.dob = patient.dob;

        if let Some(assignment) = find_assignment(&conn, patient_id, form_id).await? {
            detail.status = Some(status_or(&assignment, FALLBACK_FLAT_STATUS));
            detail.due_date = assignment.due_date;
            detail.location = assignment.location;
        }
        if let Some(submission) = latest_submission(&conn, form_id, patient_id).await? {
            responses = responses_for(&conn, submission.submission_id).await?;
            detail.submission_id = Some(submission.submission_id);
            detail.submission_status = Some(submission.status);
            detail.submitted_at = Some(submission.submitted_at);
        }
    }

    detail.completion = completion::completion(&fields, &responses);
    detail.fields = fields
        .into_iter()
        .map(|f| FieldWithResponse {
            response_value: responses.get(&f.field_id).cloned().flatten(),
            field_id: f.field_id,
            form_id: f.form_id,
            position: f.position,
            field_label: f.field_label,
            field_type: f.field_type,
            is_required: f.is_required,
        })
        .collect();
    Ok(detail)
}

/// The forms assigned to one patient with their completion. Empty when none are assigned.
pub async fn patient_forms(
    db: &Database,
    patient_id: i64,
) -> Result<Vec<PatientFormRow>, IntakeError> {
    let conn = db.connect()?;
    let assignments = assignments_for_patient(&conn, patient_id).await?;

    let mut rows = Vec::with_capacity(assignments.len());
    for a in assignments {
        let form_name = find_template(&conn, a.form_id)
            .await?
            .map(|t| t.form_name)
            .unwrap_or_else(|| format!("Form {}", a.form_id));
        let fields = fields_for_template(&conn, a.form_id).await?;
        let submission = latest_submission(&conn, a.form_id, patient_id).await?;
        let responses = match &submission {
            Some(s) => responses_for(&conn, s.submission_id).await?,
            None => HashMap::new(),
        };
        rows.push(PatientFormRow {
            form_id: a.form_id,
            form_name,
            status: status_or(&a, FALLBACK_FLAT_STATUS),
            due_date: a.due_date,
            location: a.location,
            submitted_at: submission.map(|s| s.submitted_at),
            total_fields: fields.len(),
            answered_fields: answered_count(&fields, &responses),
            completion: completion::completion(&fields, &responses),
        });
    }
    Ok(rows)
}

/// One row per (patient, assignment), newest assignment first, then newest patient.
/// Patients without any assignment appear once, after every assigned row.
pub async fn flat_dashboard(db: &Database) -> Result<Vec<DashboardRow>, IntakeError> {
    let conn = db.connect()?;
    let snapshot = Snapshot::load(&conn).await?;
    let by_patient = snapshot.assignments_by_patient();

    let mut rows = Vec::new();
    for patient in &snapshot.patients {
        let base = DashboardRow {
            patient_id: patient.id,
            patient: patient.full_name(),
            email: patient.email.clone(),
            phone: patient.phone.clone(),
            dob: patient.dob.clone(),
            patient_created_on: patient.created_on.clone(),
            form_id: None,
            form: NO_FORM_ASSIGNED.to_string(),
            status: FALLBACK_FLAT_STATUS.to_string(),
            due_date: None,
            location: None,
            email_sent: None,
            sms_sent: None,
            created: None,
            submitted_at: None,
            completion: 0.0,
        };
        match by_patient.get(&patient.id) {
            None => rows.push(base),
            Some(assignments) => {
                for a in assignments {
                    let progress = snapshot.progress(a.form_id, patient.id);
                    rows.push(DashboardRow {
                        form_id: Some(a.form_id),
                        form: snapshot.form_name(a.form_id),
                        status: status_or(a, FALLBACK_FLAT_STATUS),
                        due_date: a.due_date.clone(),
                        location: a.location.clone(),
                        email_sent: a.email_sent.clone(),
                        sms_sent: a.sms_sent.clone(),
                        created: Some(a.created.clone()),
                        submitted_at: progress.submission.map(|s| s.submitted_at.clone()),
                        completion: progress.completion,
                        ..base.clone()
                    });
                }
            }
        }
    }

    // `None` sorts below any timestamp, so unassigned patients land last.
    rows.sort_by(|a, b| {
        b.created
            .cmp(&a.created)
            .then_with(|| b.patient_created_on.cmp(&a.patient_created_on))
            .then_with(|| b.patient_id.cmp(&a.patient_id))
    });
    Ok(rows)
}

/// One entry per patient, newest first, each with its forms in assignment order.
pub async fn grouped_dashboard(db: &Database) -> Result<Vec<PatientGroup>, IntakeError> {
    let conn = db.connect()?;
    let snapshot = Snapshot::load(&conn).await?;
    let by_patient = snapshot.assignments_by_patient();

    Ok(snapshot
        .patients
        .iter()
        .map(|patient| {
            let forms: Vec<GroupedForm> = by_patient
                .get(&patient.id)
                .map(|assignments| {
                    assignments
                        .iter()
                        .map(|a| {
                            let progress = snapshot.progress(a.form_id, patient.id);
                            GroupedForm {
                                form_id: a.form_id,
                                form: snapshot.form_name(a.form_id),
                                status: status_or(a, NOT_ASSIGNED),
                                due_date: a.due_date.clone(),
                                location: a.location.clone(),
                                email_sent: a.email_sent.clone(),
                                sms_sent: a.sms_sent.clone(),
                                created: a.created.clone(),
                                submitted_at: progress.submission.map(|s| s.submitted_at.clone()),
                                completion: progress.completion,
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            PatientGroup {
                patient_id: patient.id,
                patient: patient.full_name(),
                email: patient.email.clone(),
                phone: patient.phone.clone(),
                dob: patient.dob.clone(),
                created_on: patient.created_on.clone(),
                status: if forms.is_empty() { NOT_ASSIGNED } else { ASSIGNED }.to_string(),
                forms,
            }
        })
        .collect())
}
