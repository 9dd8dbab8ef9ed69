//! Outbound email.
//!
//! Delivery goes through the SendGrid v3 API when a key is configured; otherwise
//! messages are only logged.

use async_trait::async_trait;
use serde_json::json;

use crate::auth::RESET_CODE_EXPIRY_MINUTES;
use crate::config::MailConfig;
use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError>;
}

/// Build the configured mailer.
pub fn from_config(config: &MailConfig) -> Box<dyn Mailer> {
    match &config.sendgrid_api_key {
        Some(key) => Box::new(SendGridMailer::new(
            reqwest::Client::new(),
            &config.sendgrid_url,
            key,
            &config.sender,
        )),
        None => {
            tracing::warn!("No SENDGRID_API_KEY configured. Outgoing mail will only be logged!");
            Box::new(LogMailer)
        }
    }
}

/// Sends mail through the SendGrid v3 HTTP API.
pub struct SendGridMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: String,
}

impl SendGridMailer {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str, sender: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/v3/mail/send", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            sender: sender.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": { "email": self.sender },
            "subject": message.subject,
            "content": [{ "type": "text/html", "value": message.html }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Mail provider error {}: {}",
                status.as_u16(),
                text
            )));
        }

        tracing::info!(to = %message.to, "Email sent");
        Ok(())
    }
}

/// Development mailer that writes messages to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        tracing::info!(to = %message.to, subject = %message.subject, "Mail delivery disabled, message not sent");
        tracing::debug!(body = %message.html, "Undelivered message body");
        Ok(())
    }
}

/// Compose the password-reset email.
pub fn reset_code_message(to: &str, code: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Your Password Reset Code".to_string(),
        html: format!(
            "<h2>Password Reset Request</h2>\
             <p>Your password reset code is:</p>\
             <h3 style='color:#9D42D2'>{}</h3>\
             <p>This code will expire in {} minutes.</p>",
            code, RESET_CODE_EXPIRY_MINUTES
        ),
    }
}

/// Send the reset code. Delivery failures are logged, not returned.
pub async fn send_reset_code(mailer: &dyn Mailer, to: &str, code: &str) {
    let message = reset_code_message(to, code);
    if let Err(e) = mailer.send(&message).await {
        tracing::error!(to = %to, "Failed to send reset email: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_reset_message_contains_code_and_expiry() {
        let message = reset_code_message("ada@example.com", "482913");
        assert_eq!(message.subject, "Your Password Reset Code");
        assert!(message.html.contains("482913"));
        assert!(message.html.contains("15 minutes"));
    }

    #[tokio::test]
    async fn test_sendgrid_posts_message() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v3/mail/send")
                .header("authorization", "Bearer sg-key")
                .body_contains("ada@example.com")
                .body_contains("noreply@skillforge.test");
            then.status(202);
        });

        let mailer = SendGridMailer::new(
            reqwest::Client::new(),
            &server.base_url(),
            "sg-key",
            "noreply@skillforge.test",
        );
        mailer
            .send(&reset_code_message("ada@example.com", "111111"))
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_sendgrid_error_is_upstream() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v3/mail/send");
            then.status(401).body("bad key");
        });

        let mailer = SendGridMailer::new(
            reqwest::Client::new(),
            &server.base_url(),
            "sg-key",
            "noreply@skillforge.test",
        );
        let err = mailer
            .send(&reset_code_message("ada@example.com", "111111"))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_ERROR");
        assert!(err.message().contains("401"));
    }
}
