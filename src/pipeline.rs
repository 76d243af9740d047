use crate::align::{alignment_note, estimate, plan, EditOp, Offset};
use crate::config::Config;
use crate::delivery::ReplySink;
use crate::error::Result;
use crate::media::remux::TrackLanguages;
use crate::media::{
    apply_edit, fetch_stream, fetch_waveform, load, remux, ExtractSpec, StreamKind, TempArtifact,
    WorkDir,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Settings shared by every run of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Extract bounds and video encoder settings.
    pub extract: ExtractSpec,
    /// Language tags for output tracks 0 and 1.
    pub languages: TrackLanguages,
    /// Parent of per-run work directories (system temp dir when `None`).
    pub work_root: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            extract: ExtractSpec {
                duration_cap: config.duration_cap(),
                start: Duration::ZERO,
                video_encoder: config.video_encoder.clone(),
                video_preset: config.video_preset.clone(),
            },
            languages: TrackLanguages {
                primary: config.primary_language.clone(),
                secondary: config.secondary_language.clone(),
            },
            work_root: config.work_root.clone(),
        }
    }
}

/// Pipeline stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchAudioExtracts,
    Estimate,
    FetchMediaForRemux,
    ApplyAlignment,
    Remux,
    Deliver,
}

impl Stage {
    pub const COUNT: usize = 6;

    fn number(&self) -> usize {
        *self as usize + 1
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::FetchAudioExtracts => "fetching audio extracts",
            Stage::Estimate => "estimating offset",
            Stage::FetchMediaForRemux => "fetching media for remux",
            Stage::ApplyAlignment => "applying alignment",
            Stage::Remux => "remuxing",
            Stage::Deliver => "delivering",
        };
        write!(f, "{name}")
    }
}

/// Everything one run owns: an id, a private work directory, and its sink.
pub struct RunContext {
    pub id: u64,
    pub work: WorkDir,
    pub config: PipelineConfig,
    pub sink: Arc<dyn ReplySink>,
}

impl RunContext {
    pub fn new(config: PipelineConfig, sink: Arc<dyn ReplySink>) -> Result<Self> {
        let work = WorkDir::create(config.work_root.as_deref())?;
        Ok(Self {
            id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            work,
            config,
            sink,
        })
    }
}

/// Timings from one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_time: Duration,
    pub fetch_time: Duration,
    pub estimate_time: Duration,
    pub alignment_time: Duration,
    pub remux_time: Duration,
    /// Length of the primary waveform extract.
    pub primary_duration: Duration,
    /// Length of the secondary waveform extract.
    pub secondary_duration: Duration,
}

/// Outcome of a successful run. The preview itself has been handed to the sink.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub offset: Offset,
    pub edit: EditOp,
    pub note: String,
    pub stats: PipelineStats,
}

pub const START_MESSAGE: &str = "⏬ Downloading and processing...";

pub fn caption_for(note: &str) -> String {
    format!("🧪 Preview File\n{note}")
}

/// Align `secondary_url`'s audio onto `primary_url`'s video and deliver a dual-audio preview.
///
/// The run's work directory is removed before this returns, whatever the outcome.
/// Dropping the returned future kills any running ffmpeg child and removes the directory.
pub async fn align_tracks(
    config: &PipelineConfig,
    primary_url: &str,
    secondary_url: &str,
    sink: Arc<dyn ReplySink>,
) -> Result<PipelineResult> {
    if let Err(e) = sink.notify(START_MESSAGE).await {
        warn!("Could not send progress message: {}", e);
    }

    let outcome = match RunContext::new(config.clone(), sink.clone()) {
        Ok(ctx) => {
            let span = info_span!("run", id = ctx.id);
            let outcome = run_stages(&ctx, primary_url, secondary_url)
                .instrument(span)
                .await;
            ctx.work.cleanup();
            outcome
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => {
            if let Err(e) = sink.notify(&format!("✅ Done! {}", result.note)).await {
                warn!("Could not send completion message: {}", e);
            }
            Ok(result)
        }
        Err(e) => {
            error!("Alignment failed ({}): {}", e.kind(), e);
            if let Err(send_err) = sink.notify(&format!("❌ Error: {e}")).await {
                warn!("Could not send error message: {}", send_err);
            }
            Err(e)
        }
    }
}

fn enter(stage: Stage) {
    info!("Stage {}/{}: {}", stage.number(), Stage::COUNT, stage);
}

async fn run_stages(
    ctx: &RunContext,
    primary_url: &str,
    secondary_url: &str,
) -> Result<PipelineResult> {
    let start_time = Instant::now();
    let spec = &ctx.config.extract;
    let work = &ctx.work;

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 1: Audio extracts for correlation
    // ═══════════════════════════════════════════════════════════════════════
    enter(Stage::FetchAudioExtracts);
    let fetch_start = Instant::now();

    let primary_wav = work.path(TempArtifact::PrimaryWaveform);
    let secondary_wav = work.path(TempArtifact::SecondaryWaveform);
    futures::try_join!(
        fetch_waveform(primary_url, spec, &primary_wav),
        fetch_waveform(secondary_url, spec, &secondary_wav),
    )?;
    let mut fetch_time = fetch_start.elapsed();

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 2: Offset estimation
    // ═══════════════════════════════════════════════════════════════════════
    enter(Stage::Estimate);
    let estimate_start = Instant::now();

    let (offset, primary_duration, secondary_duration) =
        tokio::task::spawn_blocking(move || -> Result<_> {
            let primary = load(&primary_wav)?;
            let secondary = load(&secondary_wav)?;
            let offset = estimate(&primary, &secondary)?;
            Ok((offset, primary.duration(), secondary.duration()))
        })
        .await??;

    let edit = plan(offset);
    let note = alignment_note(offset, edit);
    let estimate_time = estimate_start.elapsed();
    info!("Estimated offset {} → {} in {:.2}s", offset, edit, estimate_time.as_secs_f64());

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 3: Codec-preserving extracts for the remux
    // ═══════════════════════════════════════════════════════════════════════
    enter(Stage::FetchMediaForRemux);
    let media_start = Instant::now();

    let video = work.path(TempArtifact::VideoOnly);
    let primary_audio = work.path(TempArtifact::PrimaryAudioStream);
    let secondary_audio = work.path(TempArtifact::SecondaryAudioStream);
    futures::try_join!(
        fetch_stream(primary_url, spec, StreamKind::VideoOnly, &video),
        fetch_stream(primary_url, spec, StreamKind::AudioCopy, &primary_audio),
        fetch_stream(secondary_url, spec, StreamKind::AudioCopy, &secondary_audio),
    )?;
    fetch_time += media_start.elapsed();

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 4: Alignment edit on the secondary audio
    // ═══════════════════════════════════════════════════════════════════════
    enter(Stage::ApplyAlignment);
    let alignment_start = Instant::now();

    let adjusted = work.path(TempArtifact::SecondaryAudioAdjusted);
    apply_edit(&secondary_audio, edit, &adjusted).await?;
    let alignment_time = alignment_start.elapsed();

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 5: Remux
    // ═══════════════════════════════════════════════════════════════════════
    enter(Stage::Remux);
    let remux_start = Instant::now();

    let output = work.path(TempArtifact::FinalOutput);
    remux(
        &video,
        &primary_audio,
        &adjusted,
        &ctx.config.languages,
        &output,
    )
    .await?;
    let remux_time = remux_start.elapsed();

    // ═══════════════════════════════════════════════════════════════════════
    // Stage 6: Delivery
    // ═══════════════════════════════════════════════════════════════════════
    enter(Stage::Deliver);
    ctx.sink.deliver(&output, &caption_for(&note)).await?;
    debug!("Delivered {}", output.display());

    let stats = PipelineStats {
        total_time: start_time.elapsed(),
        fetch_time,
        estimate_time,
        alignment_time,
        remux_time,
        primary_duration,
        secondary_duration,
    };

    Ok(PipelineResult {
        offset,
        edit,
        note,
        stats,
    })
}

/// Print a summary of a finished run.
pub fn print_summary(result: &PipelineResult, output: &std::path::Path) {
    use console::style;

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                     Alignment Complete                        ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Output:     {}", style(output.display()).cyan());
    println!("  Offset:     {}", result.offset);
    println!("  Edit:       {}", result.edit);
    println!("  Note:       {}", result.note);
    println!(
        "  Extracts:   {:.1}s primary / {:.1}s secondary",
        result.stats.primary_duration.as_secs_f64(),
        result.stats.secondary_duration.as_secs_f64()
    );
    println!();
    println!("  Timing:");
    println!("    Fetch:     {:.2}s", result.stats.fetch_time.as_secs_f64());
    println!("    Estimate:  {:.2}s", result.stats.estimate_time.as_secs_f64());
    println!("    Align:     {:.2}s", result.stats.alignment_time.as_secs_f64());
    println!("    Remux:     {:.2}s", result.stats.remux_time.as_secs_f64());
    println!("    Total:     {:.2}s", result.stats.total_time.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
