use crate::delivery::ReplySink;
use crate::error::{DubsyncError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Default Bot API host.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Extra slack on top of the long-poll timeout before the HTTP request gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
}

/// Minimal Telegram Bot API client.
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    /// Create a client for `token` against `api_base` (usually [`TELEGRAM_API_URL`]).
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn decode<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        debug!(
            "Telegram {} response ({}): {}",
            method,
            status,
            body.chars().take(500).collect::<String>()
        );

        let parsed: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            DubsyncError::Api(format!(
                "Telegram {method} returned unparseable body ({status}): {e}"
            ))
        })?;

        if !parsed.ok {
            return Err(DubsyncError::Api(format!(
                "Telegram {} failed ({}): {}",
                method,
                status,
                parsed.description.unwrap_or_else(|| "no description".to_string())
            )));
        }

        parsed
            .result
            .ok_or_else(|| DubsyncError::Api(format!("Telegram {method} returned no result")))
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<Update>> {
        let mut query = vec![("timeout", timeout.as_secs().to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.endpoint("getUpdates"))
            .query(&query)
            .timeout(timeout + POLL_GRACE)
            .send()
            .await?;

        Self::decode("getUpdates", response).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<Message> {
        let request = SendMessageRequest {
            chat_id,
            text,
            reply_to_message_id: reply_to,
        };
        let response = self
            .client
            .post(self.endpoint("sendMessage"))
            .json(&request)
            .send()
            .await?;

        Self::decode("sendMessage", response).await
    }

    /// Upload a video file with a caption.
    pub async fn send_video(
        &self,
        chat_id: i64,
        video: &Path,
        caption: &str,
        reply_to: Option<i64>,
    ) -> Result<Message> {
        let file_bytes = fs::read(video).await?;
        let file_name = video
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("preview.mp4")
            .to_string();

        let video_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str("video/mp4")?;

        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("supports_streaming", "true")
            .part("video", video_part);

        if let Some(id) = reply_to {
            form = form.text("reply_to_message_id", id.to_string());
        }

        let response = self
            .client
            .post(self.endpoint("sendVideo"))
            .multipart(form)
            .send()
            .await?;

        Self::decode("sendVideo", response).await
    }
}

/// Replies in the originating chat; the preview goes to `destination` when set.
pub struct TelegramSink {
    client: Arc<TelegramClient>,
    chat_id: i64,
    reply_to: Option<i64>,
    destination: Option<i64>,
}

impl TelegramSink {
    pub fn new(client: Arc<TelegramClient>, chat_id: i64) -> Self {
        Self {
            client,
            chat_id,
            reply_to: None,
            destination: None,
        }
    }

    pub fn replying_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn with_destination(mut self, destination: Option<i64>) -> Self {
        self.destination = destination;
        self
    }
}

#[async_trait]
impl ReplySink for TelegramSink {
    async fn notify(&self, text: &str) -> Result<()> {
        self.client
            .send_message(self.chat_id, text, self.reply_to)
            .await
            .map(|_| ())
    }

    async fn deliver(&self, media: &Path, caption: &str) -> Result<()> {
        let target = self.destination.unwrap_or(self.chat_id);
        let reply_to = if target == self.chat_id {
            self.reply_to
        } else {
            None
        };
        self.client
            .send_video(target, media, caption, reply_to)
            .await
            .map(|_| ())
    }
}
