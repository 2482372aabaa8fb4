use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::sender::{DeliveryId, EmailError, EmailSender};

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Email sender backed by the Resend HTTP API.
pub struct ResendEmailSender {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

impl ResendEmailSender {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl EmailSender for ResendEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<DeliveryId, EmailError> {
        let response = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&SendRequest {
                from: &self.from,
                to,
                subject,
                html,
            })
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Provider(format!("{status}: {body}")));
        }

        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| EmailError::Provider(e.to_string()))?;

        Ok(DeliveryId(body.id))
    }
}
