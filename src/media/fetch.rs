use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{DubsyncError, Result};

use super::{ExtractSpec, StreamKind, WAVEFORM_SAMPLE_RATE};

/// Lines of ffmpeg stderr kept in error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Check if FFmpeg is installed and accessible.
pub async fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            DubsyncError::Fetch(format!(
                "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(DubsyncError::Fetch("FFmpeg check failed".to_string()));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Run ffmpeg with `args`, mapping any failure through `on_error`.
///
/// The child is killed if the returned future is dropped before it exits.
pub async fn run_ffmpeg<F>(args: Vec<OsString>, on_error: F) -> Result<()>
where
    F: FnOnce(String) -> DubsyncError,
{
    debug!("ffmpeg {:?}", args);

    let output = match Command::new("ffmpeg")
        .args(["-hide_banner", "-nostdin"])
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => return Err(on_error(format!("Failed to run FFmpeg: {e}"))),
    };

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(on_error(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr_tail(&stderr)
        )));
    }

    if !stderr.trim().is_empty() {
        debug!("ffmpeg stderr: {}", stderr_tail(&stderr));
    }
    Ok(())
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

fn bounded_input(url: &str, spec: &ExtractSpec) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-ss".into(),
        spec.start_arg().into(),
        "-t".into(),
        spec.cap_arg().into(),
        "-i".into(),
        url.into(),
    ]
}

pub(crate) fn waveform_args(url: &str, spec: &ExtractSpec, output: &Path) -> Vec<OsString> {
    let rate = WAVEFORM_SAMPLE_RATE.to_string();
    let mut args = bounded_input(url, spec);
    args.extend(
        [
            "-vn",
            "-ac",
            "1",
            "-ar",
            rate.as_str(),
            "-acodec",
            "pcm_s16le",
            "-f",
            "wav",
        ]
        .map(OsString::from),
    );
    args.push(output.into());
    args
}

pub(crate) fn stream_args(
    url: &str,
    spec: &ExtractSpec,
    kind: StreamKind,
    output: &Path,
) -> Vec<OsString> {
    let mut args = bounded_input(url, spec);
    match kind {
        StreamKind::VideoOnly => {
            args.extend([
                OsString::from("-an"),
                OsString::from("-c:v"),
                OsString::from(&spec.video_encoder),
            ]);
            if let Some(ref preset) = spec.video_preset {
                args.extend([OsString::from("-preset"), OsString::from(preset)]);
            }
        }
        StreamKind::AudioCopy => {
            args.extend(["-vn", "-c:a", "copy"].map(OsString::from));
        }
    }
    args.push(output.into());
    args
}

/// Ensure ffmpeg left a non-empty file behind.
async fn ensure_written(output: &Path) -> Result<()> {
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(DubsyncError::Fetch(format!(
            "FFmpeg produced an empty file: {}",
            output.display()
        ))),
        Err(_) => Err(DubsyncError::Fetch(format!(
            "Output file was not created: {}",
            output.display()
        ))),
    }
}

/// Decode the leading excerpt of `url` to mono 16 kHz PCM WAV at `output`.
pub async fn fetch_waveform(url: &str, spec: &ExtractSpec, output: &Path) -> Result<()> {
    info!("Fetching waveform from {}", url);

    run_ffmpeg(waveform_args(url, spec, output), |msg| {
        DubsyncError::Fetch(format!("{url}: {msg}"))
    })
    .await?;
    ensure_written(output).await?;

    debug!("Waveform written to {}", output.display());
    Ok(())
}

/// Take a codec-preserving excerpt of `url` of the given kind at `output`.
pub async fn fetch_stream(
    url: &str,
    spec: &ExtractSpec,
    kind: StreamKind,
    output: &Path,
) -> Result<()> {
    info!("Fetching {} stream from {}", kind, url);

    run_ffmpeg(stream_args(url, spec, kind, output), |msg| {
        DubsyncError::Fetch(format!("{url} ({kind}): {msg}"))
    })
    .await?;
    ensure_written(output).await?;

    debug!("{} stream written to {}", kind, output.display());
    Ok(())
}
