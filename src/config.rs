use crate::bot::telegram::TELEGRAM_API_URL;
use crate::error::{DubsyncError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// What the process is about to do; decides which settings are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One-shot alignment from the command line.
    Align { send: bool },
    /// Long-running chat bot.
    Bot,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Align { .. } => write!(f, "align"),
            Mode::Bot => write!(f, "bot"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot_token: Option<String>,
    pub chat_id: Option<i64>,
    pub api_base: String,
    pub duration_cap_secs: u64,
    pub primary_language: String,
    pub secondary_language: String,
    pub max_concurrent_runs: usize,
    pub video_encoder: String,
    pub video_preset: Option<String>,
    pub work_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: TELEGRAM_API_URL.to_string(),
            duration_cap_secs: 60,
            primary_language: "eng".to_string(),
            secondary_language: "hin".to_string(),
            max_concurrent_runs: 2,
            video_encoder: "libx264".to_string(),
            video_preset: Some("ultrafast".to_string()),
            work_root: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    DubsyncError::Config(format!(
                        "Failed to parse {}: {e}",
                        config_path.display()
                    ))
                })?;
            }
        }

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Override fields from environment-style lookups. Unparseable numbers are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("BOT_TOKEN").filter(|t| !t.is_empty()) {
            self.bot_token = Some(token);
        }
        if let Some(chat) = lookup("CHAT_ID") {
            if let Ok(id) = chat.trim().parse::<i64>() {
                // 0 is the conventional "no destination" value
                self.chat_id = (id != 0).then_some(id);
            }
        }
        if let Some(base) = lookup("DUBSYNC_API_BASE") {
            self.api_base = base;
        }
        if let Some(cap) = lookup("DUBSYNC_DURATION_CAP") {
            if let Ok(c) = cap.parse() {
                self.duration_cap_secs = c;
            }
        }
        if let Some(lang) = lookup("DUBSYNC_PRIMARY_LANG") {
            self.primary_language = lang;
        }
        if let Some(lang) = lookup("DUBSYNC_SECONDARY_LANG") {
            self.secondary_language = lang;
        }
        if let Some(concurrency) = lookup("DUBSYNC_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.max_concurrent_runs = c;
            }
        }
        if let Some(encoder) = lookup("DUBSYNC_VIDEO_ENCODER") {
            self.video_encoder = encoder;
        }
        if let Some(preset) = lookup("DUBSYNC_VIDEO_PRESET") {
            self.video_preset = (!preset.is_empty()).then_some(preset);
        }
        if let Some(root) = lookup("DUBSYNC_WORK_ROOT") {
            self.work_root = Some(PathBuf::from(root));
        }
    }

    pub fn validate(&self, mode: Mode) -> Result<()> {
        match mode {
            Mode::Bot => {
                if self.bot_token.is_none() {
                    return Err(DubsyncError::Config(
                        "BOT_TOKEN not set. Export it with: export BOT_TOKEN=123456:ABC..."
                            .to_string(),
                    ));
                }
            }
            Mode::Align { send: true } => {
                if self.bot_token.is_none() {
                    return Err(DubsyncError::Config(
                        "BOT_TOKEN not set; --send needs bot credentials".to_string(),
                    ));
                }
                if self.chat_id.is_none() {
                    return Err(DubsyncError::Config(
                        "CHAT_ID not set; --send needs a destination chat".to_string(),
                    ));
                }
            }
            Mode::Align { send: false } => {}
        }

        if self.duration_cap_secs == 0 {
            return Err(DubsyncError::Config(
                "Duration cap must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_runs == 0 {
            return Err(DubsyncError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        for lang in [&self.primary_language, &self.secondary_language] {
            if lang.len() != 3 || !lang.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(DubsyncError::Config(format!(
                    "Language tag '{lang}' must be a three-letter code (e.g. eng, hin)"
                )));
            }
        }

        Ok(())
    }

    pub fn duration_cap(&self) -> Duration {
        Duration::from_secs(self.duration_cap_secs)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dubsync").join("config.toml"))
    }
}
