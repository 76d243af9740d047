pub mod fetch;
pub mod remux;
pub mod signal;

pub use fetch::{check_ffmpeg, fetch_stream, fetch_waveform, run_ffmpeg};
pub use remux::{apply_edit, remux};
pub use signal::load;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::Result;

/// Sample rate every waveform extract is normalised to.
pub const WAVEFORM_SAMPLE_RATE: u32 = 16_000;

/// Which codec-preserving extract to take from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Video only, re-encoded at a fast preset; audio dropped.
    VideoOnly,
    /// Audio only, stream-copied without re-encode.
    AudioCopy,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::VideoOnly => write!(f, "video-only"),
            StreamKind::AudioCopy => write!(f, "audio-copy"),
        }
    }
}

/// Bounds and encoder settings shared by every extract of a run.
#[derive(Debug, Clone)]
pub struct ExtractSpec {
    pub duration_cap: Duration,
    pub start: Duration,
    pub video_encoder: String,
    pub video_preset: Option<String>,
}

impl Default for ExtractSpec {
    fn default() -> Self {
        Self {
            duration_cap: Duration::from_secs(60),
            start: Duration::ZERO,
            video_encoder: "libx264".to_string(),
            video_preset: Some("ultrafast".to_string()),
        }
    }
}

impl ExtractSpec {
    pub(crate) fn start_arg(&self) -> String {
        format!("{:.3}", self.start.as_secs_f64())
    }

    pub(crate) fn cap_arg(&self) -> String {
        format!("{:.3}", self.duration_cap.as_secs_f64())
    }
}

/// Mono samples plus their sample rate.
#[derive(Debug, Clone)]
pub struct AudioSignal {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl AudioSignal {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Every file a run may create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempArtifact {
    PrimaryWaveform,
    SecondaryWaveform,
    VideoOnly,
    PrimaryAudioStream,
    SecondaryAudioStream,
    SecondaryAudioAdjusted,
    FinalOutput,
}

impl TempArtifact {
    pub const ALL: [TempArtifact; 7] = [
        TempArtifact::PrimaryWaveform,
        TempArtifact::SecondaryWaveform,
        TempArtifact::VideoOnly,
        TempArtifact::PrimaryAudioStream,
        TempArtifact::SecondaryAudioStream,
        TempArtifact::SecondaryAudioAdjusted,
        TempArtifact::FinalOutput,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            TempArtifact::PrimaryWaveform => "primary.wav",
            TempArtifact::SecondaryWaveform => "secondary.wav",
            TempArtifact::VideoOnly => "video.mp4",
            TempArtifact::PrimaryAudioStream => "primary_audio.mka",
            TempArtifact::SecondaryAudioStream => "secondary_audio.mka",
            TempArtifact::SecondaryAudioAdjusted => "secondary_adjusted.m4a",
            TempArtifact::FinalOutput => "preview_fixed.mp4",
        }
    }
}

/// A run-private directory holding that run's artifacts.
///
/// Removed by [`WorkDir::cleanup`], or on drop if the run future is abandoned.
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh uniquely-named directory under `root` (system temp dir when `None`).
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let builder_root = root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        std::fs::create_dir_all(&builder_root)?;
        let dir = tempfile::Builder::new()
            .prefix("dubsync-run-")
            .tempdir_in(&builder_root)?;
        debug!("Using work directory: {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, artifact: TempArtifact) -> PathBuf {
        self.dir.path().join(artifact.file_name())
    }

    /// Best-effort removal of every artifact and the directory itself.
    pub fn cleanup(self) {
        for artifact in TempArtifact::ALL {
            let path = self.path(artifact);
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed temp file: {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => debug!("Could not remove {}: {e}", path.display()),
            }
        }
        let root = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Could not remove work directory {}: {e}", root.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names_are_unique() {
        let mut names: Vec<_> = TempArtifact::ALL.iter().map(|a| a.file_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), TempArtifact::ALL.len());
    }

    #[test]
    fn test_work_dirs_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkDir::create(Some(root.path())).unwrap();
        let b = WorkDir::create(Some(root.path())).unwrap();
        assert_ne!(
            a.path(TempArtifact::FinalOutput),
            b.path(TempArtifact::FinalOutput)
        );
    }

    #[test]
    fn test_cleanup_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create(Some(root.path())).unwrap();
        std::fs::write(work.path(TempArtifact::PrimaryWaveform), b"x").unwrap();
        std::fs::write(work.path(TempArtifact::FinalOutput), b"y").unwrap();
        let dir = work.root().to_path_buf();

        work.cleanup();

        assert!(!dir.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let work = WorkDir::create(Some(root.path())).unwrap();
            std::fs::write(work.path(TempArtifact::VideoOnly), b"v").unwrap();
            work.root().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_extract_spec_args() {
        let spec = ExtractSpec {
            duration_cap: Duration::from_secs(60),
            ..Default::default()
        };
        assert_eq!(spec.start_arg(), "0.000");
        assert_eq!(spec.cap_arg(), "60.000");
    }
}
