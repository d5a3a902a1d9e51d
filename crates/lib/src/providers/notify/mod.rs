pub mod http;

use crate::errors::NotifyError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// An email handed to the mail provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// A text message. `to` is in E.164 form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

/// Settings of the JSON mail API.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct EmailSettings {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub sender: Option<String>,
}

/// Settings of the Twilio-style SMS REST API.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct SmsSettings {
    pub api_base: Option<String>,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub messaging_service_sid: Option<String>,
}

/// A trait for the transports that deliver form links to patients.
///
/// Implementations only report whether the provider accepted the message; stamping
/// the assignments is left to the caller.
#[async_trait]
pub trait Notifier: Send + Sync + Debug {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError>;

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotifyError>;
}

/// The invitation email for a batch of forms.
pub fn invitation_email(to: &str, name: &str, link: &str, due_date: Option<&str>) -> EmailMessage {
    let due = due_date
        .map(|d| format!("<p>Please complete them by <strong>{d}</strong>.</p>"))
        .unwrap_or_default();
    EmailMessage {
        to: to.to_string(),
        subject: "Please complete your intake forms".to_string(),
        html: format!(
            "<p>Hello {name},</p>\
             <p>You have intake forms waiting for you.</p>\
             {due}\
             <p><a href=\"{link}\">Open your forms</a></p>"
        ),
    }
}

/// The invitation text message for a batch of forms.
pub fn invitation_sms(to: &str, name: &str, link: &str, due_date: Option<&str>) -> SmsMessage {
    let due = due_date
        .map(|d| format!(" by {d}"))
        .unwrap_or_default();
    SmsMessage {
        to: to.to_string(),
        body: format!("Hello {name}, please complete your intake forms{due}: {link}"),
    }
}
