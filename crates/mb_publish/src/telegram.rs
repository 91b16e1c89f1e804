use async_trait::async_trait;
use mb_core::{Error, PostMessage, PublishReceipt, Publisher, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::format::post_html;

pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BotInfo {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

/// Bot API publisher. The bot token is part of every request path, so it
/// never appears in errors or debug output.
pub struct TelegramPublisher {
    client: Arc<Client>,
    token: String,
    base_url: String,
}

impl TelegramPublisher {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Config("TELEGRAM_BOT_TOKEN is required".to_string()));
        }
        Ok(Self {
            client: Arc::new(Client::new()),
            token,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T, B>(&self, method: &str, body: Option<&B>) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
        B: Serialize + ?Sized,
    {
        let request = match body {
            Some(body) => self.client.post(self.method_url(method)).json(body),
            None => self.client.get(self.method_url(method)),
        };
        let response = request
            .send()
            .await
            .map_err(|e| Error::PublishFailed(format!("{} request failed: {}", method, e.without_url())))?;
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::PublishFailed(format!("{} returned {} with unreadable body: {}", method, status, e.without_url())))?;

        if !body.ok {
            return Err(Error::PublishFailed(format!(
                "{} rejected ({}): {}",
                method,
                status,
                body.description.unwrap_or_else(|| "no description".to_string())
            )));
        }
        body.result
            .ok_or_else(|| Error::PublishFailed(format!("{} returned no result", method)))
    }

    /// Sends raw HTML text, returning the message id.
    pub async fn send_text(&self, text: &str, channel: &str) -> Result<PublishReceipt> {
        let request = SendMessageRequest {
            chat_id: channel,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: false,
        };
        let sent: SentMessage = self.call("sendMessage", Some(&request)).await?;
        Ok(PublishReceipt {
            message_id: sent.message_id.to_string(),
        })
    }

    /// Verifies the token with `getMe`.
    pub async fn check(&self) -> Result<BotInfo> {
        let bot: BotInfo = self.call::<BotInfo, ()>("getMe", None).await?;
        info!(username = ?bot.username, "Telegram bot reachable");
        Ok(bot)
    }
}

impl fmt::Debug for TelegramPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramPublisher")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    fn name(&self) -> &str {
        "telegram"
    }

    #[instrument(skip(self, message), fields(link = %message.link))]
    async fn publish(&self, message: &PostMessage, channel: &str) -> Result<PublishReceipt> {
        self.send_text(&post_html(message), channel).await
    }
}
