use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a crop invocation.
///
/// Nothing here is retried: every variant is terminal for the current run.
/// An ambiguous override lookup is deliberately absent because it falls back
/// to automatic detection instead of failing.
#[derive(Debug, Error)]
pub enum CropError {
    #[error("input file does not exist: {}", path.display())]
    MissingInput { path: PathBuf },

    #[error("ffprobe failed for {}: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },

    #[error("crop detection produced no candidate for {}: {reason}", path.display())]
    Detection { path: PathBuf, reason: String },

    #[error("failed to delete existing file {}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("crop transcode failed for {}: {reason}", path.display())]
    Transcode { path: PathBuf, reason: String },

    #[error("failed to move cropped file {} over {}", staged.display(), destination.display())]
    Replace {
        staged: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} did not finish within {secs} seconds and was killed")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("invalid rectangle {width}x{height}: both dimensions must be positive")]
    InvalidRectangle { width: u32, height: u32 },

    #[error("invalid hook event: {0}")]
    InvalidEvent(String),

    #[error("failed to load override table {}: {reason}", path.display())]
    OverrideTable { path: PathBuf, reason: String },
}

impl CropError {
    /// Short name of the stage that failed, used in the warning log entry.
    pub fn stage(&self) -> &'static str {
        match self {
            CropError::MissingInput { .. } => "validate inputs",
            CropError::Probe { .. } => "inspect resolution",
            CropError::Detection { .. } => "detect crop",
            CropError::Delete { .. } => "delete destination",
            CropError::Transcode { .. } => "transcode",
            CropError::ToolTimeout { .. } => "external tool",
            CropError::Replace { .. } => "replace destination",
            CropError::InvalidRectangle { .. } => "resolve target",
            CropError::InvalidEvent(_) => "parse event",
            CropError::OverrideTable { .. } => "load overrides",
        }
    }
}
