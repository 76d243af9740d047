use std::ffi::OsString;
use std::path::Path;

use tracing::{debug, info};

use crate::align::EditOp;
use crate::error::{DubsyncError, Result};

use super::fetch::run_ffmpeg;

/// Bitrate for every AAC encode.
pub const AAC_BITRATE: &str = "192k";

/// Three-letter language tags written on the two output audio tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLanguages {
    pub primary: String,
    pub secondary: String,
}

impl Default for TrackLanguages {
    fn default() -> Self {
        Self {
            primary: "eng".to_string(),
            secondary: "hin".to_string(),
        }
    }
}

pub(crate) fn edit_args(input: &Path, edit: EditOp, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];
    if let EditOp::TrimFrom(ms) = edit {
        args.extend([
            OsString::from("-ss"),
            OsString::from(EditOp::trim_seconds_arg(ms)),
        ]);
    }
    args.extend([OsString::from("-i"), OsString::from(input)]);
    if let EditOp::DelayBy(ms) = edit {
        args.extend([
            OsString::from("-af"),
            OsString::from(format!("adelay=delays={ms}:all=1")),
        ]);
    }
    args.extend(["-c:a", "aac", "-b:a", AAC_BITRATE].map(OsString::from));
    args.push(output.into());
    args
}

/// Re-encode the secondary audio to AAC with `edit` applied.
pub async fn apply_edit(input: &Path, edit: EditOp, output: &Path) -> Result<()> {
    info!("Applying alignment: {}", edit);

    run_ffmpeg(edit_args(input, edit, output), |msg| {
        DubsyncError::Remux(format!("alignment edit ({edit}) failed: {msg}"))
    })
    .await?;

    ensure_output(output, "Adjusted audio").await?;

    debug!("Adjusted audio written to {}", output.display());
    Ok(())
}

pub(crate) fn remux_args(
    video: &Path,
    primary_audio: &Path,
    secondary_audio: &Path,
    languages: &TrackLanguages,
    output: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];
    for input in [video, primary_audio, secondary_audio] {
        args.extend([OsString::from("-i"), OsString::from(input)]);
    }
    args.extend(
        [
            "-map", "0:v:0", "-map", "1:a:0", "-map", "2:a:0", "-c:v", "copy", "-c:a", "aac",
            "-b:a", AAC_BITRATE, "-shortest",
        ]
        .map(OsString::from),
    );
    args.extend([
        OsString::from("-metadata:s:a:0"),
        OsString::from(format!("language={}", languages.primary)),
        OsString::from("-metadata:s:a:1"),
        OsString::from(format!("language={}", languages.secondary)),
    ]);
    args.push(output.into());
    args
}

/// Combine one video stream and two audio streams into `output`.
///
/// Track 0 is the primary audio, track 1 the secondary; the output is cut to the
/// shortest input.
pub async fn remux(
    video: &Path,
    primary_audio: &Path,
    secondary_audio: &Path,
    languages: &TrackLanguages,
    output: &Path,
) -> Result<()> {
    for input in [video, primary_audio, secondary_audio] {
        if !input.exists() {
            return Err(DubsyncError::Remux(format!(
                "Missing remux input: {}",
                input.display()
            )));
        }
    }

    info!(
        "Remuxing preview ({} + {}) into {}",
        languages.primary,
        languages.secondary,
        output.display()
    );

    run_ffmpeg(
        remux_args(video, primary_audio, secondary_audio, languages, output),
        DubsyncError::Remux,
    )
    .await?;

    ensure_output(output, "Remux output").await
}

/// Reject a missing or zero-length ffmpeg output.
async fn ensure_output(output: &Path, what: &str) -> Result<()> {
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(DubsyncError::Remux(format!(
            "{what} is empty: {}",
            output.display()
        ))),
        Err(_) => Err(DubsyncError::Remux(format!(
            "{what} was not created: {}",
            output.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_output_is_remux_error() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("secondary_adjusted.m4a");
        std::fs::write(&empty, b"").unwrap();

        let err = ensure_output(&empty, "Adjusted audio").await.unwrap_err();
        assert!(matches!(err, DubsyncError::Remux(ref msg) if msg.contains("empty")));

        let missing = dir.path().join("missing.m4a");
        assert!(matches!(
            ensure_output(&missing, "Adjusted audio").await,
            Err(DubsyncError::Remux(_))
        ));

        std::fs::write(&empty, b"aac").unwrap();
        assert!(ensure_output(&empty, "Adjusted audio").await.is_ok());
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_delay_args_use_all_channel_adelay() {
        let args = strings(&edit_args(
            Path::new("in.mka"),
            EditOp::DelayBy(250),
            Path::new("out.m4a"),
        ));
        assert_eq!(
            args,
            vec![
                "-y", "-i", "in.mka", "-af", "adelay=delays=250:all=1", "-c:a", "aac", "-b:a",
                "192k", "out.m4a"
            ]
        );
    }

    #[test]
    fn test_trim_args_seek_before_input() {
        let args = strings(&edit_args(
            Path::new("in.mka"),
            EditOp::TrimFrom(1041),
            Path::new("out.m4a"),
        ));
        assert_eq!(
            args,
            vec!["-y", "-ss", "1.041", "-i", "in.mka", "-c:a", "aac", "-b:a", "192k", "out.m4a"]
        );
    }

    #[test]
    fn test_noop_still_reencodes() {
        let args = strings(&edit_args(Path::new("in.mka"), EditOp::NoOp, Path::new("out.m4a")));
        assert!(!args.contains(&"-af".to_string()));
        assert!(!args.contains(&"-ss".to_string()));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
    }

    #[test]
    fn test_remux_args_map_and_tag_tracks() {
        let languages = TrackLanguages {
            primary: "eng".to_string(),
            secondary: "tam".to_string(),
        };
        let args = strings(&remux_args(
            Path::new("v.mp4"),
            Path::new("p.mka"),
            Path::new("s.m4a"),
            &languages,
            Path::new("out.mp4"),
        ));
        assert_eq!(&args[..7], ["-y", "-i", "v.mp4", "-i", "p.mka", "-i", "s.m4a"]);
        assert!(args.windows(6).any(|w| w == ["-map", "0:v:0", "-map", "1:a:0", "-map", "2:a:0"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "copy"]));
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.windows(2).any(|w| w == ["-metadata:s:a:0", "language=eng"]));
        assert!(args.windows(2).any(|w| w == ["-metadata:s:a:1", "language=tam"]));
    }

    #[tokio::test]
    async fn test_remux_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = remux(
            &dir.path().join("v.mp4"),
            &dir.path().join("p.mka"),
            &dir.path().join("s.m4a"),
            &TrackLanguages::default(),
            &dir.path().join("out.mp4"),
        )
        .await;
        assert!(matches!(result, Err(DubsyncError::Remux(_))));
    }
}
