use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use crate::config::{AutocropConfig, DetectConfig, EncodeProfile};
use crate::cropdetect;
use crate::error::CropError;
use crate::executor::build_crop_args;
use crate::ffprobe;
use crate::geometry::Rectangle;
use crate::process::ToolRunner;

/// The external media tools the crop decision depends on.
///
/// Every call blocks the orchestrator until the underlying process exits.
#[allow(async_fn_in_trait)]
pub trait MediaTools {
    /// Current frame dimensions of the first video stream
    async fn probe_resolution(&self, path: &Path) -> Result<Rectangle, CropError>;

    /// Every crop candidate reported across the detection window, in order
    async fn crop_candidates(&self, path: &Path) -> Result<Vec<Rectangle>, CropError>;

    /// Encode `source` cropped to `target` into `output`, copying audio and subtitles
    async fn transcode_crop(&self, source: &Path, output: &Path, target: Rectangle) -> Result<(), CropError>;
}

/// [`MediaTools`] backed by local ffmpeg/ffprobe binaries
#[derive(Debug, Clone)]
pub struct FfmpegTools {
    pub ffmpeg_bin: PathBuf,
    pub ffprobe_bin: PathBuf,
    pub detect: DetectConfig,
    pub encode: EncodeProfile,
    runner: ToolRunner,
}

impl FfmpegTools {
    pub fn new(cfg: &AutocropConfig) -> Self {
        FfmpegTools {
            ffmpeg_bin: cfg.ffmpeg_bin.clone(),
            ffprobe_bin: cfg.ffprobe_bin.clone(),
            detect: cfg.detect.clone(),
            encode: cfg.encode.clone(),
            runner: ToolRunner::new(cfg.tool_timeout_secs),
        }
    }
}

impl MediaTools for FfmpegTools {
    async fn probe_resolution(&self, path: &Path) -> Result<Rectangle, CropError> {
        let probe_failure = |reason: String| CropError::Probe {
            path: path.to_path_buf(),
            reason,
        };

        let args = ffprobe::build_probe_args(path);
        let output = self
            .runner
            .run(&self.ffprobe_bin, &args)
            .await
            .map_err(|e| e.into_crop_error(&self.ffprobe_bin, probe_failure))?;

        if !output.success {
            return Err(probe_failure(format!(
                "exit code {}: {}",
                output.exit_code.unwrap_or(-1),
                output.stderr_tail(5)
            )));
        }

        let rect = ffprobe::parse_resolution(&output.stdout, path)?;
        debug!("ffprobe: {} is {}", path.display(), rect);
        Ok(rect)
    }

    async fn crop_candidates(&self, path: &Path) -> Result<Vec<Rectangle>, CropError> {
        let detection_failure = |reason: String| CropError::Detection {
            path: path.to_path_buf(),
            reason,
        };

        let args = cropdetect::build_detect_args(path, &self.detect);
        info!(
            "Sampling {}s from {}s into {} for crop detection",
            self.detect.duration_secs,
            self.detect.start_secs,
            path.display()
        );

        let output = self
            .runner
            .run(&self.ffmpeg_bin, &args)
            .await
            .map_err(|e| e.into_crop_error(&self.ffmpeg_bin, detection_failure))?;

        let candidates = cropdetect::parse_candidates(&output.stderr);

        // ffmpeg can exit non-zero on a damaged tail after reporting plenty of
        // usable frames; only an empty candidate list is a detection failure.
        if !output.success {
            if candidates.is_empty() {
                return Err(detection_failure(format!(
                    "exit code {}: {}",
                    output.exit_code.unwrap_or(-1),
                    output.stderr_tail(5)
                )));
            }
            warn!(
                "cropdetect exited with {:?} for {} but reported {} candidates; using them",
                output.exit_code,
                path.display(),
                candidates.len()
            );
        }

        Ok(candidates)
    }

    async fn transcode_crop(&self, source: &Path, output: &Path, target: Rectangle) -> Result<(), CropError> {
        let transcode_failure = |reason: String| CropError::Transcode {
            path: output.to_path_buf(),
            reason,
        };

        let args = build_crop_args(source, output, target, &self.encode);
        info!("Cropping {} to {} -> {}", source.display(), target, output.display());

        let result = self
            .runner
            .run(&self.ffmpeg_bin, &args)
            .await
            .map_err(|e| e.into_crop_error(&self.ffmpeg_bin, transcode_failure))?;

        if !result.success {
            return Err(transcode_failure(format!(
                "ffmpeg exit code {}\nCommand: {} {}\nSTDERR (tail):\n{}",
                result.exit_code.unwrap_or(-1),
                self.ffmpeg_bin.display(),
                args.join(" "),
                result.stderr_tail(20)
            )));
        }

        Ok(())
    }
}
