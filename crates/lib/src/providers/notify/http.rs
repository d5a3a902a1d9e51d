use crate::{
    errors::NotifyError,
    providers::notify::{EmailMessage, EmailSettings, Notifier, SmsMessage, SmsSettings},
    validation::to_e164,
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use tracing::{debug, info};

// --- Mail API request structures ---

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

// --- HTTP notifier implementation ---

/// Delivers email through a JSON mail API (bearer key) and SMS through a Twilio-style
/// REST API (basic auth, form-encoded).
#[derive(Clone, Debug)]
pub struct HttpNotifier {
    client: ReqwestClient,
    email: EmailSettings,
    sms: SmsSettings,
}

impl HttpNotifier {
    pub fn new(email: EmailSettings, sms: SmsSettings) -> Result<Self, NotifyError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(NotifyError::ReqwestClientBuild)?;
        Ok(Self { client, email, sms })
    }

    fn messages_url(&self, account_sid: &str) -> String {
        let base = self
            .sms
            .api_base
            .as_deref()
            .unwrap_or("https://api.twilio.com")
            .trim_end_matches('/');
        format!("{base}/2010-04-01/Accounts/{account_sid}/Messages.json")
    }
}

async fn check(response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let (Some(api_url), Some(api_key), Some(sender)) = (
            self.email.api_url.as_deref(),
            self.email.api_key.as_deref(),
            self.email.sender.as_deref(),
        ) else {
            return Err(NotifyError::NotConfigured("Email"));
        };
        if message.to.trim().is_empty() {
            return Err(NotifyError::MissingRecipient("Patient has no email address".to_string()));
        }

        let request = MailRequest {
            from: sender,
            to: vec![message.to.trim()],
            subject: &message.subject,
            html: &message.html,
        };
        debug!(to = %message.to, "Sending email.");
        let response = self
            .client
            .post(api_url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;
        check(response).await?;
        info!(to = %message.to, "Email accepted by provider.");
        Ok(())
    }

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotifyError> {
        let (Some(account_sid), Some(auth_token)) = (
            self.sms.account_sid.as_deref(),
            self.sms.auth_token.as_deref(),
        ) else {
            return Err(NotifyError::NotConfigured("SMS"));
        };
        if message.to.chars().all(|c| !c.is_ascii_digit()) {
            return Err(NotifyError::MissingRecipient("Patient has no phone number".to_string()));
        }

        let to = to_e164(&message.to);
        let mut form: Vec<(&str, &str)> = vec![("To", to.as_str()), ("Body", message.body.as_str())];
        match (
            self.sms.messaging_service_sid.as_deref(),
            self.sms.from_number.as_deref(),
        ) {
            (Some(service_sid), _) => form.push(("MessagingServiceSid", service_sid)),
            (None, Some(from)) => form.push(("From", from)),
            (None, None) => return Err(NotifyError::NotConfigured("SMS sender")),
        }

        debug!(to = %to, "Sending SMS.");
        let response = self
            .client
            .post(self.messages_url(account_sid))
            .basic_auth(account_sid, Some(auth_token))
            .form(&form)
            .send()
            .await?;
        check(response).await?;
        info!(to = %to, "SMS accepted by provider.");
        Ok(())
    }
}
