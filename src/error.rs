use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubsyncError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Remux failed: {0}")]
    Remux(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DubsyncError {
    /// Short stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DubsyncError::Fetch(_) => "fetch",
            DubsyncError::Decode(_) => "decode",
            DubsyncError::Precondition(_) => "precondition",
            DubsyncError::Remux(_) => "remux",
            DubsyncError::Config(_) => "config",
            DubsyncError::Api(_) => "api",
            DubsyncError::Cancelled => "cancelled",
            DubsyncError::Io(_) => "io",
            DubsyncError::Http(_) => "http",
            DubsyncError::Json(_) => "json",
            DubsyncError::Task(_) => "task",
        }
    }
}

pub type Result<T> = std::result::Result<T, DubsyncError>;
