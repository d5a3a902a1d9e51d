//! # Form Dispatch
//!
//! Sends a batch of templates to one or more patients. Per recipient, one delivery
//! token is issued and stored on every assignment of the batch before any transport
//! is attempted. The delivery stamp is written only when the provider accepted the
//! message, so a failed send leaves the assignment in place with no stamp.
//!
//! The whole batch is checked before the first write, so a bad recipient anywhere in it
//! leaves the database untouched.

use super::{form_ref, id_from_value, AppError, AppState};
use crate::types::{DispatchResult, DispatchStatus, Recipient, SendFormsPayload, SendFormsResponse};
use axum::{extract::State, Json};
use intake::{
    delivery::{issue_token, mark_delivered_in_office, record_token, stamp_email_sent, stamp_sms_sent},
    patients::get_patient,
    providers::notify::{invitation_email, invitation_sms},
    templates::get_template,
    types::{DeliveryChannel, Patient},
    validation::{non_blank, normalize_phone, parse_optional_date},
    IntakeError,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

pub async fn send_forms_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<SendFormsPayload>,
) -> Result<Json<SendFormsResponse>, AppError> {
    let form_ids = payload
        .forms
        .iter()
        .map(form_ref)
        .collect::<Result<Vec<_>, _>>()?;
    if form_ids.is_empty() {
        return Err(IntakeError::validation("No forms selected").into());
    }
    if payload.recipients.is_empty() {
        return Err(IntakeError::validation("No recipients selected").into());
    }
    let db = &app_state.sqlite_provider.db;
    for form_id in &form_ids {
        get_template(db, *form_id).await?;
    }
    let mut prepared = Vec::with_capacity(payload.recipients.len());
    for recipient in &payload.recipients {
        prepared.push(prepare(&app_state, recipient).await?);
    }

    let mut qr_tokens = BTreeMap::new();
    let mut results = Vec::with_capacity(prepared.len());
    for target in &prepared {
        let result = dispatch_one(&app_state, target, &form_ids, payload.delivery).await?;
        qr_tokens.insert(target.patient.id.to_string(), result.token.clone());
        results.push(result);
    }

    let failed = results
        .iter()
        .filter(|r| r.status == DispatchStatus::Failed)
        .count();
    info!(
        recipients = results.len(),
        failed,
        channel = payload.delivery.as_str(),
        "Dispatched forms."
    );

    Ok(Json(SendFormsResponse {
        qr_tokens,
        delivery_method: payload.delivery,
        recipients: results,
    }))
}

/// A recipient with its patient loaded and its inputs normalised.
struct Target<'a> {
    patient: Patient,
    recipient: &'a Recipient,
    due_date: Option<String>,
    location: String,
}

async fn prepare<'a>(
    app_state: &AppState,
    recipient: &'a Recipient,
) -> Result<Target<'a>, AppError> {
    let patient_id = id_from_value(&recipient.patient_id, "patientId")?;
    let patient = get_patient(&app_state.sqlite_provider.db, patient_id).await?;
    let due_date = parse_optional_date(recipient.due_date.as_deref())?;
    let location = non_blank(recipient.location.as_deref())
        .unwrap_or_else(|| app_state.config.default_location.clone());
    Ok(Target {
        patient,
        recipient,
        due_date,
        location,
    })
}

async fn dispatch_one(
    app_state: &AppState,
    target: &Target<'_>,
    form_ids: &[i64],
    channel: DeliveryChannel,
) -> Result<DispatchResult, AppError> {
    let db = &app_state.sqlite_provider.db;
    let Target {
        patient,
        recipient,
        due_date,
        location,
    } = target;
    let patient_id = patient.id;
    let name = non_blank(recipient.name.as_deref()).unwrap_or_else(|| patient.full_name());

    let token = issue_token(patient_id, form_ids);
    record_token(db, patient_id, form_ids, &token, due_date.as_deref(), Some(location.as_str())).await?;
    let link = format!(
        "{}/fill-form/{token}",
        app_state.config.public_base_url.trim_end_matches('/')
    );

    let outcome = match channel {
        DeliveryChannel::Office => {
            mark_delivered_in_office(db, patient_id, form_ids, due_date.as_deref(), Some(location.as_str()))
                .await?;
            Ok(DispatchStatus::Office)
        }
        DeliveryChannel::Email => {
            match non_blank(recipient.email.as_deref()).or_else(|| patient.email.clone()) {
                None => Err("Patient has no email address".to_string()),
                Some(to) => {
                    let message = invitation_email(&to, &name, &link, due_date.as_deref());
                    match app_state.notifier.send_email(&message).await {
                        Ok(()) => {
                            stamp_email_sent(db, patient_id, form_ids, due_date.as_deref(), Some(location.as_str()))
                                .await?;
                            Ok(DispatchStatus::Sent)
                        }
                        Err(e) => Err(e.to_string()),
                    }
                }
            }
        }
        DeliveryChannel::Sms => {
            match normalize_phone(recipient.phone.as_deref()).or_else(|| patient.phone.clone()) {
                None => Err("Patient has no phone number".to_string()),
                Some(to) => {
                    let message = invitation_sms(&to, &name, &link, due_date.as_deref());
                    match app_state.notifier.send_sms(&message).await {
                        Ok(()) => {
                            stamp_sms_sent(db, patient_id, form_ids, due_date.as_deref(), Some(location.as_str()))
                                .await?;
                            Ok(DispatchStatus::Sent)
                        }
                        Err(e) => Err(e.to_string()),
                    }
                }
            }
        }
    };

    let (status, error) = match outcome {
        Ok(status) => (status, None),
        Err(error) => {
            warn!(patient_id, channel = channel.as_str(), %error, "Delivery failed.");
            (DispatchStatus::Failed, Some(error))
        }
    };

    Ok(DispatchResult {
        patient_id,
        name,
        token,
        link,
        status,
        error,
    })
}
