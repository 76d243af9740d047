pub mod align;
pub mod bot;
pub mod config;
pub mod delivery;
pub mod error;
pub mod media;
pub mod pipeline;

pub use config::{Config, Mode};
pub use delivery::{ConsoleSink, ReplySink};
pub use error::{DubsyncError, Result};
pub use pipeline::{align_tracks, print_summary, PipelineConfig, PipelineResult, PipelineStats};
