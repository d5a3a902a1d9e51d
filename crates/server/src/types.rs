//! Request and response payloads of the HTTP surface that have no counterpart in the
//! `intake` library.

use intake::types::DeliveryChannel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `?patientId=` on the form routes. Kept as text so `"7.0"` and `"null"` get a proper 400.
#[derive(Debug, Deserialize, Default)]
pub struct PatientQuery {
    #[serde(rename = "patientId")]
    pub patient_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignFormsPayload {
    #[serde(default)]
    pub patient_id: Option<Value>,
    #[serde(default)]
    pub form_ids: Vec<Value>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIdsPayload {
    #[serde(default)]
    pub patient_ids: Vec<i64>,
}

/// The body of a save/submit request. Field ids and values are loosely typed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFormPayload {
    /// Used when the query string names no patient.
    #[serde(default)]
    pub patient_id: Option<Value>,
    #[serde(default)]
    pub fields: Vec<Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

// --- Dispatch ---

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub patient_id: Value,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendFormsPayload {
    #[serde(default)]
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub forms: Vec<Value>,
    #[serde(default)]
    pub delivery: DeliveryChannel,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Sent,
    Failed,
    Office,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub patient_id: i64,
    pub name: String,
    pub token: String,
    pub link: String,
    pub status: DispatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendFormsResponse {
    pub qr_tokens: BTreeMap<String, String>,
    pub delivery_method: DeliveryChannel,
    pub recipients: Vec<DispatchResult>,
}

// --- Appointments, analytics & auth ---

#[derive(Debug, Deserialize, Default)]
pub struct AppointmentQuery {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub upcoming: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostponePayload {
    #[serde(default, alias = "appointmentDate", alias = "date")]
    pub new_date: Option<String>,
    #[serde(default, alias = "appointmentTime", alias = "time")]
    pub new_time: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub compare_start_date: Option<String>,
    #[serde(default)]
    pub compare_end_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub status: String,
    pub message: String,
}
