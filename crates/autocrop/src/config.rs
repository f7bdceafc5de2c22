use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use crate::geometry::Tolerance;

/// How the cropped file is written over the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CropStrategy {
    /// Encode next to the destination, then rename over it on success.
    #[default]
    Staged,
    /// Delete the destination first, then encode straight into it.
    /// A failed encode leaves the destination missing.
    InPlace,
}

/// Sample window and filter used for automatic crop detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Seconds to skip before sampling (avoids intros and logos)
    pub start_secs: u64,
    /// Length of the sampled window in seconds
    pub duration_secs: u64,
    /// ffmpeg video filter producing `crop=W:H:X:Y` lines
    pub filter: String,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            start_secs: 120,
            duration_secs: 300,
            filter: "cropdetect=24:16:0".to_string(),
        }
    }
}

/// Fixed encode profile for the crop transcode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeProfile {
    pub video_codec: String,
    pub preset: String,
    pub tune: Option<String>,
    pub profile: Option<String>,
    pub level: Option<String>,
    pub crf: u8,
    pub threads: Option<u32>,
    pub max_muxing_queue_size: u32,
}

impl Default for EncodeProfile {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            preset: "slow".to_string(),
            tune: Some("film".to_string()),
            profile: Some("high".to_string()),
            level: Some("4.1".to_string()),
            crf: 19,
            threads: Some(4),
            max_muxing_queue_size: 1024,
        }
    }
}

/// Configuration for the autocrop hook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutocropConfig {
    /// CSV with manual crop values for series (Series, Season, Horizontal, Vertical)
    pub tv_overrides: Option<PathBuf>,
    /// CSV with manual crop values for movies (Movie, Horizontal, Vertical)
    pub movie_overrides: Option<PathBuf>,
    /// Directory for crop_info.log / crop_err.log; stderr only when unset
    pub log_dir: Option<PathBuf>,
    /// Log level filter (error, warn, info, debug, trace)
    pub log_level: String,
    /// Pixel tolerance applied to width and height independently
    pub tolerance: Tolerance,
    /// Path to ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Path to ffprobe binary
    pub ffprobe_bin: PathBuf,
    /// Kill an external tool after this many seconds; wait forever when unset
    pub tool_timeout_secs: Option<u64>,
    pub strategy: CropStrategy,
    pub detect: DetectConfig,
    pub encode: EncodeProfile,
}

impl Default for AutocropConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl AutocropConfig {
    /// Create a default configuration matching the historical hook behaviour
    pub fn default_config() -> Self {
        Self {
            tv_overrides: None,
            movie_overrides: None,
            log_dir: None,
            log_level: "info".to_string(),
            tolerance: Tolerance::default(),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            tool_timeout_secs: None,
            strategy: CropStrategy::default(),
            detect: DetectConfig::default(),
            encode: EncodeProfile::default(),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                config = if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?
                } else {
                    serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?
                };
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that can never produce a crop decision
    pub fn validate(&self) -> Result<()> {
        if self.detect.duration_secs == 0 {
            anyhow::bail!("detect.duration_secs must be greater than zero");
        }
        if self.detect.filter.trim().is_empty() {
            anyhow::bail!("detect.filter must not be empty");
        }
        if self.encode.video_codec.trim().is_empty() {
            anyhow::bail!("encode.video_codec must not be empty");
        }
        if let Some(0) = self.tool_timeout_secs {
            anyhow::bail!("tool_timeout_secs must be greater than zero when set");
        }
        Ok(())
    }
}
