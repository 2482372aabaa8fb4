use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// Provider-assigned id of an accepted email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryId(pub String);

#[derive(Debug, Error)]
pub enum EmailError {
    /// The provider accepted the request but rejected the send.
    #[error("email provider error: {0}")]
    Provider(String),

    /// The provider could not be reached.
    #[error("email transport error: {0}")]
    Transport(String),
}

/// An email-sending collaborator.
///
/// Accepts (recipient, subject, HTML body) and returns a delivery id or an
/// error. Callers decide whether a failure matters; the order lifecycle
/// logs and continues.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<DeliveryId, EmailError>;
}

/// A sent email captured by [`RecordingEmailSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Email sender for tests: records every send instead of delivering.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<DeliveryId, EmailError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| EmailError::Transport("recorder poisoned".to_string()))?;
        sent.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(DeliveryId(format!("recorded-{}", sent.len())))
    }
}
