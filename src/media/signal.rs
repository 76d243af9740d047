use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::{debug, info};

use crate::error::{DubsyncError, Result};

use super::AudioSignal;

/// Read a WAV file into a mono signal.
///
/// Multi-channel input keeps only the first channel. No resampling is done.
pub fn load(path: &Path) -> Result<AudioSignal> {
    let reader = WavReader::open(path).map_err(|e| {
        DubsyncError::Decode(format!("Failed to open WAV file {}: {e}", path.display()))
    })?;

    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(DubsyncError::Decode(format!(
            "WAV header in {} declares a 0 Hz sample rate",
            path.display()
        )));
    }
    let channels = spec.channels.max(1) as usize;

    debug!(
        "Loading {}: {} Hz, {} channels, {} bits",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<std::result::Result<Vec<f64>, hound::Error>>()
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<Vec<f64>, hound::Error>>(),
    }
    .map_err(|e| DubsyncError::Decode(format!("Corrupt WAV data in {}: {e}", path.display())))?;

    let samples: Vec<f64> = interleaved.into_iter().step_by(channels).collect();

    if samples.is_empty() {
        return Err(DubsyncError::Decode(format!(
            "No audio samples in {}",
            path.display()
        )));
    }

    let signal = AudioSignal {
        samples,
        sample_rate: spec.sample_rate,
    };
    info!(
        "Loaded {} samples ({:.2}s) from {}",
        signal.samples.len(),
        signal.duration().as_secs_f64(),
        path.display()
    );
    Ok(signal)
}
