use anyhow::Result;
use async_trait::async_trait;
use intake::errors::NotifyError;
use intake::providers::notify::{EmailMessage, Notifier, SmsMessage};
use intake::types::{NewField, NewPatient, NewTemplate, Patient, TemplateWithFields};
use intake::SqliteProvider;
use std::sync::{Arc, Mutex};
use turso::Database;

// --- Test Setup ---

/// A helper struct to manage database creation for each test.
pub struct TestSetup {
    pub provider: SqliteProvider,
    pub db: Database,
}

impl TestSetup {
    /// Creates a new, isolated in-memory database and initializes the schema.
    pub async fn new() -> Result<Self> {
        let provider = SqliteProvider::new(":memory:").await?;
        provider.initialize_schema().await?;
        let db = provider.db.clone();
        Ok(Self { provider, db })
    }

    /// Registers a patient with only a name.
    pub async fn patient(&self, first_name: &str, last_name: &str) -> Result<Patient> {
        let patient = intake::patients::create_patient(
            &self.db,
            NewPatient {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: Some(format!(
                    "{}.{}@example.com",
                    first_name.to_lowercase(),
                    last_name.to_lowercase()
                )),
                phone: Some("5551234567".to_string()),
                dob: None,
            },
        )
        .await?;
        Ok(patient)
    }

    /// Creates a template with one text field per label.
    pub async fn template(&self, name: &str, labels: &[&str]) -> Result<TemplateWithFields> {
        let template = intake::templates::create_template(
            &self.db,
            NewTemplate {
                name: name.to_string(),
                form_url: None,
                fields: labels
                    .iter()
                    .map(|label| NewField {
                        label: label.to_string(),
                        field_type: "text".to_string(),
                        required: false,
                    })
                    .collect(),
            },
        )
        .await?;
        Ok(template)
    }
}

// --- Mock Notifier ---

/// A notifier that records every message instead of sending it.
#[derive(Clone, Debug, Default)]
pub struct MockNotifier {
    pub emails: Arc<Mutex<Vec<EmailMessage>>>,
    pub sms: Arc<Mutex<Vec<SmsMessage>>>,
    fail_email: Arc<Mutex<bool>>,
    fail_sms: Arc<Mutex<bool>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent email fail with a provider error.
    pub fn fail_email(&self) {
        *self.fail_email.lock().unwrap() = true;
    }

    /// Makes every subsequent SMS fail with a provider error.
    pub fn fail_sms(&self) {
        *self.fail_sms.lock().unwrap() = true;
    }

    pub fn sent_emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().unwrap().clone()
    }

    pub fn sent_sms(&self) -> Vec<SmsMessage> {
        self.sms.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        if *self.fail_email.lock().unwrap() {
            return Err(NotifyError::Api {
                status: 500,
                body: "mock email failure".to_string(),
            });
        }
        self.emails.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn send_sms(&self, message: &SmsMessage) -> Result<(), NotifyError> {
        if *self.fail_sms.lock().unwrap() {
            return Err(NotifyError::Api {
                status: 500,
                body: "mock sms failure".to_string(),
            });
        }
        self.sms.lock().unwrap().push(message.clone());
        Ok(())
    }
}
