use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use dubsync::bot::{BotService, TelegramClient, TelegramSink};
use dubsync::config::{Config, Mode};
use dubsync::delivery::{ConsoleSink, ReplySink};
use dubsync::error::DubsyncError;
use dubsync::media::check_ffmpeg;
use dubsync::pipeline::{align_tracks, print_summary, PipelineConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "dubsync")]
#[command(version, about = "Align a dubbed audio track with an original video")]
#[command(
    long_about = "Estimate the offset between a secondary-language audio track and the audio \
                  of a primary video, then remux a preview carrying both tracks aligned."
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Align once and write the preview locally
    Align {
        /// Primary (original-language) video URL or path
        primary_url: String,

        /// Secondary (dub) audio URL or path
        secondary_url: String,

        /// Where to write the preview
        #[arg(short, long, default_value = "preview_fixed.mp4")]
        output: PathBuf,

        /// Also upload the preview to the configured CHAT_ID
        #[arg(long)]
        send: bool,
    },

    /// Run the chat bot, answering /delay commands
    Bot,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    match EnvFilter::try_from_default_env() {
        Ok(filter) => builder.with_env_filter(filter).init(),
        Err(_) => builder.with_max_level(level).init(),
    }
}

/// Local copy first, then an upload to the configured chat.
struct ForwardingSink {
    console: Arc<ConsoleSink>,
    remote: TelegramSink,
}

#[async_trait]
impl ReplySink for ForwardingSink {
    async fn notify(&self, text: &str) -> dubsync::Result<()> {
        self.console.notify(text).await
    }

    async fn deliver(&self, media: &Path, caption: &str) -> dubsync::Result<()> {
        self.console.deliver(media, caption).await?;
        self.remote.deliver(media, caption).await
    }
}

async fn run_align(
    config: &Config,
    primary_url: &str,
    secondary_url: &str,
    output: PathBuf,
    send: bool,
) -> Result<()> {
    check_ffmpeg().await.context("FFmpeg is required")?;

    let pipeline = PipelineConfig::from_config(config);
    let console = Arc::new(ConsoleSink::new(output.clone(), true));

    let sink: Arc<dyn ReplySink> = match (send, config.bot_token.as_deref(), config.chat_id) {
        (true, Some(token), Some(chat_id)) => {
            let client = Arc::new(TelegramClient::new(&config.api_base, token));
            Arc::new(ForwardingSink {
                console: console.clone(),
                remote: TelegramSink::new(client, chat_id),
            })
        }
        _ => console.clone(),
    };

    let outcome = tokio::select! {
        result = align_tracks(&pipeline, primary_url, secondary_url, sink) => result,
        _ = tokio::signal::ctrl_c() => Err(DubsyncError::Cancelled),
    };
    console.finish();

    let result = outcome.context("Alignment failed")?;
    print_summary(&result, &output);
    Ok(())
}

async fn run_bot(config: &Config) -> Result<()> {
    check_ffmpeg().await.context("FFmpeg is required")?;

    let service = BotService::new(config).context("Failed to start bot")?;

    tokio::select! {
        result = service.run() => result.context("Bot stopped")?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down; in-flight runs are abandoned and cleaned up");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mode = match cli.command {
        Command::Align { send, .. } => Mode::Align { send },
        Command::Bot => Mode::Bot,
    };

    // Load and validate configuration before doing any work
    let config = Config::load().context("Failed to load configuration")?;
    config
        .validate(mode)
        .context("Configuration validation failed")?;

    info!("Mode:     {}", mode);
    info!("Cap:      {}s", config.duration_cap_secs);
    info!(
        "Tracks:   {} (primary) / {} (secondary)",
        config.primary_language, config.secondary_language
    );

    match cli.command {
        Command::Align {
            primary_url,
            secondary_url,
            output,
            send,
        } => run_align(&config, &primary_url, &secondary_url, output, send).await,
        Command::Bot => run_bot(&config).await,
    }
}
