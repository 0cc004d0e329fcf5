use crate::notifiers::Notifier;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

/// Sends plain-text messages through the Telegram bot API.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(
        api_base: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        let api_base: String = api_base.into();
        TelegramNotifier {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.send_message_url())
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "Telegram API returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
