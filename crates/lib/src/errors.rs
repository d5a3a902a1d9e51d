use thiserror::Error;

/// Custom error types for the intake library.
#[derive(Error, Debug)]
pub enum IntakeError {
    /// Missing or malformed input, rejected before any mutation.
    #[error("{0}")]
    Validation(String),
    /// A referenced patient, template, appointment or token was not found.
    #[error("{0}")]
    NotFound(String),
    /// The write would collide with an existing row (e.g. a booked slot).
    #[error("{0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(#[from] turso::Error),
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl IntakeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        IntakeError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        IntakeError::NotFound(msg.into())
    }
}

/// Errors raised while handing a message to an email or SMS provider.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to build HTTP client: {0}")]
    ReqwestClientBuild(#[source] reqwest::Error),
    #[error("Request to notification provider failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Notification provider returned {status}: {body}")]
    Api { status: u16, body: String },
    /// The channel has no provider configured.
    #[error("{0} delivery is not configured")]
    NotConfigured(&'static str),
    /// The recipient has no address for the channel.
    #[error("{0}")]
    MissingRecipient(String),
}
