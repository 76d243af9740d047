use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::error::Result;

/// Where a pipeline run reports progress and hands over its finished preview.
///
/// `deliver` is called while the run's work directory still exists; the sink must copy
/// or upload the file before returning.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
    async fn deliver(&self, media: &Path, caption: &str) -> Result<()>;
}

/// Terminal sink: spinner for progress, copies the preview to a fixed path.
pub struct ConsoleSink {
    output: PathBuf,
    spinner: Option<ProgressBar>,
}

impl ConsoleSink {
    pub fn new(output: PathBuf, show_progress: bool) -> Self {
        let spinner = show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        Self { output, spinner }
    }

    pub fn finish(&self) {
        if let Some(ref pb) = self.spinner {
            pb.finish_and_clear();
        }
    }
}

#[async_trait]
impl ReplySink for ConsoleSink {
    async fn notify(&self, text: &str) -> Result<()> {
        match self.spinner {
            Some(ref pb) => pb.set_message(text.to_string()),
            None => info!("{}", text),
        }
        Ok(())
    }

    async fn deliver(&self, media: &Path, caption: &str) -> Result<()> {
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(media, &self.output).await?;
        info!(
            "Preview written to {} ({})",
            self.output.display(),
            caption.replace('\n', " ")
        );
        Ok(())
    }
}

/// In-memory sink that records every interaction; copies delivered media into `keep_dir`.
///
/// Not used by either binary mode. It exists so the unit tests and the `tests/` suites
/// can run the pipeline without a terminal or a chat.
#[derive(Default)]
pub struct RecordingSink {
    keep_dir: Option<PathBuf>,
    messages: Mutex<Vec<String>>,
    deliveries: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keeping_media_in(dir: PathBuf) -> Self {
        Self {
            keep_dir: Some(dir),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// `(kept copy or original path, caption)` for each delivery.
    pub fn deliveries(&self) -> Vec<(PathBuf, String)> {
        self.deliveries.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn notify(&self, text: &str) -> Result<()> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(text.to_string());
        }
        Ok(())
    }

    async fn deliver(&self, media: &Path, caption: &str) -> Result<()> {
        let recorded = match self.keep_dir {
            Some(ref dir) => {
                let name = media
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_else(|| "preview.mp4".into());
                let kept = dir.join(name);
                tokio::fs::copy(media, &kept).await?;
                kept
            }
            None => media.to_path_buf(),
        };
        if let Ok(mut deliveries) = self.deliveries.lock() {
            deliveries.push((recorded, caption.to_string()));
        }
        Ok(())
    }
}
