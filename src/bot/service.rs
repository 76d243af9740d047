use crate::bot::command::{parse_delay_command, CommandError, DelayCommand, USAGE};
use crate::bot::telegram::{Message, TelegramClient, TelegramSink};
use crate::config::Config;
use crate::error::{DubsyncError, Result};
use crate::pipeline::{align_tracks, PipelineConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Long-poll timeout passed to getUpdates.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Base delay for exponential backoff after a failed poll (milliseconds).
const BASE_DELAY_MS: u64 = 1000;

/// Upper bound on the backoff delay (milliseconds).
const MAX_DELAY_MS: u64 = 30_000;

fn backoff_delay(consecutive_failures: u32) -> Duration {
    let exp = consecutive_failures.saturating_sub(1).min(16);
    Duration::from_millis((BASE_DELAY_MS << exp).min(MAX_DELAY_MS))
}

/// Polls for `/delay` commands and runs one isolated pipeline per command.
pub struct BotService {
    client: Arc<TelegramClient>,
    pipeline: PipelineConfig,
    destination: Option<i64>,
    permits: Arc<Semaphore>,
    poll_timeout: Duration,
}

impl BotService {
    pub fn new(config: &Config) -> Result<Self> {
        let token = config.bot_token.as_ref().ok_or_else(|| {
            DubsyncError::Config(
                "BOT_TOKEN not set. Set BOT_TOKEN environment variable.".to_string(),
            )
        })?;

        Ok(Self {
            client: Arc::new(TelegramClient::new(&config.api_base, token)),
            pipeline: PipelineConfig::from_config(config),
            destination: config.chat_id,
            permits: Arc::new(Semaphore::new(config.max_concurrent_runs.max(1))),
            poll_timeout: POLL_TIMEOUT,
        })
    }

    /// Set the long-poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Poll forever. Only returns if the task is dropped.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Bot started (max {} concurrent runs)",
            self.permits.available_permits()
        );

        let mut offset = None;
        let mut failures = 0u32;
        loop {
            match self.poll_once(&mut offset).await {
                Ok(handles) => {
                    failures = 0;
                    if !handles.is_empty() {
                        debug!("Dispatched {} update(s)", handles.len());
                    }
                }
                Err(e) => {
                    failures += 1;
                    let delay = backoff_delay(failures);
                    warn!(
                        "Polling failed (attempt {}): {}; retrying in {:?}",
                        failures, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Fetch one batch of updates and dispatch each; advances `offset` past the batch.
    pub async fn poll_once(&self, offset: &mut Option<i64>) -> Result<Vec<JoinHandle<()>>> {
        let updates = self.client.get_updates(*offset, self.poll_timeout).await?;

        let mut handles = Vec::new();
        for update in updates {
            *offset = Some(offset.map_or(update.update_id + 1, |o| o.max(update.update_id + 1)));
            if let Some(handle) = update.message.and_then(|m| self.dispatch(m)) {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    fn dispatch(&self, message: Message) -> Option<JoinHandle<()>> {
        let text = message.text.as_deref()?;
        match parse_delay_command(text) {
            Err(CommandError::NotACommand) => None,
            Err(CommandError::Usage) => {
                let client = self.client.clone();
                let chat_id = message.chat.id;
                let reply_to = message.message_id;
                Some(tokio::spawn(async move {
                    if let Err(e) = client.send_message(chat_id, USAGE, Some(reply_to)).await {
                        warn!("Could not send usage reply: {}", e);
                    }
                }))
            }
            Ok(command) => Some(self.spawn_run(command, &message)),
        }
    }

    fn spawn_run(&self, command: DelayCommand, message: &Message) -> JoinHandle<()> {
        let sink = Arc::new(
            TelegramSink::new(self.client.clone(), message.chat.id)
                .replying_to(message.message_id)
                .with_destination(self.destination),
        );
        let pipeline = self.pipeline.clone();
        let permits = self.permits.clone();
        let chat_id = message.chat.id;

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            info!(
                "Aligning for chat {}: {} + {}",
                chat_id, command.primary_url, command.secondary_url
            );
            let outcome =
                align_tracks(&pipeline, &command.primary_url, &command.secondary_url, sink).await;
            match outcome {
                Ok(result) => info!("Run for chat {} finished: {}", chat_id, result.note),
                Err(e) => warn!("Run for chat {} failed: {}", chat_id, e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(4), Duration::from_millis(8000));
        assert_eq!(backoff_delay(10), Duration::from_millis(MAX_DELAY_MS));
        assert_eq!(backoff_delay(1000), Duration::from_millis(MAX_DELAY_MS));
    }

    #[test]
    fn test_new_requires_token() {
        assert!(BotService::new(&Config::default()).is_err());

        let mut config = Config::default();
        config.bot_token = Some("123:abc".to_string());
        assert!(BotService::new(&config).is_ok());
    }
}
