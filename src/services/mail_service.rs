use reqwest::Client;
use serde_json::json;

use crate::errors::{AppError, Result};
use crate::models::otp::OTP_TTL_MINUTES;

/// Delivers OTP mail through an HTTP mail API. Without an endpoint configured
/// messages are only logged.
#[derive(Clone)]
pub struct MailService {
    api_url: Option<String>,
    api_key: String,
    from: String,
    client: Client,
}

impl MailService {
    pub fn new(api_url: Option<String>, api_key: String, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            client: Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_url.is_some()
    }

    pub async fn send_otp(&self, to: &str, name: &str, otp: &str) -> Result<()> {
        let body = format!(
            "Hello {},\n\nYour verification code is {}. It is valid for {} minutes.",
            name, otp, OTP_TTL_MINUTES
        );

        let Some(url) = &self.api_url else {
            tracing::warn!(to = %to, "mail delivery disabled, OTP not sent");
            tracing::debug!(to = %to, otp = %otp, "undelivered OTP");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": "Your verification code",
                "text": body,
            }))
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("Mail API error: {}", e)))?;

        if response.status().is_success() {
            tracing::info!(to = %to, "OTP mail sent");
            Ok(())
        } else {
            Err(AppError::ExternalApi(format!(
                "Mail sending failed with status: {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_mailer_succeeds_without_network() {
        let mail = MailService::new(None, String::new(), "no-reply@example.com".into());
        assert!(!mail.is_enabled());
        mail.send_otp("user@example.com", "Sari", "123456").await.unwrap();
    }
}
