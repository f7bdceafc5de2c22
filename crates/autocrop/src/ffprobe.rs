use std::path::Path;
use serde::Deserialize;
use crate::error::CropError;
use crate::geometry::Rectangle;

/// Subset of ffprobe's JSON report requested by [`build_probe_args`]
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeData {
    #[serde(default)]
    pub streams: Vec<FFProbeStream>,
}

/// Stream-level dimensions from ffprobe
#[derive(Debug, Clone, Deserialize)]
pub struct FFProbeStream {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Arguments asking ffprobe for the dimensions of the first video stream
pub fn build_probe_args(file_path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "stream=width,height".to_string(),
        "-of".to_string(),
        "json".to_string(),
        file_path.to_string_lossy().to_string(),
    ]
}

/// Parse ffprobe JSON output into the current resolution of `file_path`.
///
/// A report without a video stream, or with a stream lacking positive
/// dimensions, is treated as a probe failure.
pub fn parse_resolution(json_str: &str, file_path: &Path) -> Result<Rectangle, CropError> {
    let probe_failure = |reason: String| CropError::Probe {
        path: file_path.to_path_buf(),
        reason,
    };

    let data: FFProbeData = serde_json::from_str(json_str)
        .map_err(|e| probe_failure(format!("unparseable ffprobe JSON: {}", e)))?;

    let stream = data
        .streams
        .first()
        .ok_or_else(|| probe_failure("no video stream reported".to_string()))?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) => Rectangle::new(width, height)
            .map_err(|_| probe_failure(format!("invalid dimensions {}x{}", width, height))),
        _ => Err(probe_failure("video stream has no width/height".to_string())),
    }
}
