use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::application::notify::{Email, MailError, Mailer};

/// ログに出すだけのメーラー（デバッグ用）
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(
            to = %email.to,
            reply_to = ?email.reply_to,
            "メール: {}\n{}",
            email.subject,
            email.text
        );
        Ok(())
    }
}

/// メール API の応答待ちの上限
pub const MAIL_TIMEOUT: Duration = Duration::from_secs(10);

/// Resend 形式のメール API
pub struct ResendMailer {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self::with_timeout(api_url, api_key, from, MAIL_TIMEOUT)
    }

    pub fn with_timeout(api_url: String, api_key: String, from: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }

    fn payload(&self, email: &Email) -> serde_json::Value {
        let mut payload = json!({
            "from": self.from,
            "to": [email.to],
            "subject": email.subject,
            "text": email.text,
        });
        if let Some(reply_to) = &email.reply_to {
            payload["reply_to"] = json!(reply_to);
        }
        payload
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(email))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| MailError(Box::new(e)))?;
        info!("{} にメールを送信しました", email.to);
        Ok(())
    }
}
