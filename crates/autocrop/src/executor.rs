//! Crop execution.
//!
//! The destination is usually a hard link to the source. Writing into it
//! directly would rewrite the shared inode, so both strategies replace the
//! destination's directory entry instead of its contents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::{debug, info, warn};
use crate::config::{CropStrategy, EncodeProfile};
use crate::error::CropError;
use crate::geometry::Rectangle;
use crate::tools::MediaTools;

/// Build the ffmpeg crop transcode command.
///
/// Maps every input stream, re-encodes video through the crop filter with
/// the fixed profile and copies audio and subtitles untouched.
pub fn build_crop_args(input: &Path, output: &Path, target: Rectangle, profile: &EncodeProfile) -> Vec<String> {
    let mut args = Vec::new();

    args.push("-hide_banner".to_string());
    args.push("-nostdin".to_string());
    args.push("-y".to_string());

    args.push("-i".to_string());
    args.push(input.to_string_lossy().to_string());

    args.push("-map".to_string());
    args.push("0".to_string());

    // Crop filter must come before the encoder
    args.push("-filter:v".to_string());
    args.push(target.crop_filter());

    args.push("-c:v".to_string());
    args.push(profile.video_codec.clone());
    args.push("-preset".to_string());
    args.push(profile.preset.clone());
    if let Some(tune) = &profile.tune {
        args.push("-tune".to_string());
        args.push(tune.clone());
    }
    if let Some(encoder_profile) = &profile.profile {
        args.push("-profile:v".to_string());
        args.push(encoder_profile.clone());
    }
    if let Some(level) = &profile.level {
        args.push("-level".to_string());
        args.push(level.clone());
    }
    args.push("-crf".to_string());
    args.push(profile.crf.to_string());

    // Audio: copy
    args.push("-c:a".to_string());
    args.push("copy".to_string());

    // Subtitles: copy
    args.push("-c:s".to_string());
    args.push("copy".to_string());

    args.push("-max_muxing_queue_size".to_string());
    args.push(profile.max_muxing_queue_size.to_string());
    if let Some(threads) = profile.threads {
        args.push("-threads".to_string());
        args.push(threads.to_string());
    }

    args.push(output.to_string_lossy().to_string());

    args
}

/// Path the staged strategy encodes into: `<stem>.autocrop-tmp.<ext>` next to
/// the destination, so the final rename never crosses a filesystem and
/// ffmpeg still infers the container from the extension.
pub fn staged_path(destination: &Path) -> PathBuf {
    let stem = destination
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = match destination.extension() {
        Some(ext) => format!("{}.autocrop-tmp.{}", stem, ext.to_string_lossy()),
        None => format!("{}.autocrop-tmp", stem),
    };
    destination.with_file_name(name)
}

fn path_present(path: &Path) -> bool {
    // symlink_metadata so a dangling link still counts as existing content
    fs::symlink_metadata(path).is_ok()
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Replace `destination` with a copy of `source` cropped to `target`.
///
/// Callers must ensure at most one crop is in flight per destination.
pub async fn crop<T: MediaTools>(
    tools: &T,
    source: &Path,
    destination: &Path,
    target: Rectangle,
    strategy: CropStrategy,
) -> Result<(), CropError> {
    match strategy {
        CropStrategy::Staged => crop_staged(tools, source, destination, target).await,
        CropStrategy::InPlace => crop_in_place(tools, source, destination, target).await,
    }
}

async fn crop_staged<T: MediaTools>(
    tools: &T,
    source: &Path,
    destination: &Path,
    target: Rectangle,
) -> Result<(), CropError> {
    let staged = staged_path(destination);

    // Step 1: clear a leftover from an interrupted run
    if path_present(&staged) {
        warn!("Removing stale staged file from an earlier run: {}", staged.display());
        fs::remove_file(&staged).map_err(|e| CropError::Delete {
            path: staged.clone(),
            source: e,
        })?;
    }

    // Step 2: encode beside the destination; the destination stays intact
    if let Err(e) = tools.transcode_crop(source, &staged, target).await {
        discard_staged(&staged);
        return Err(e);
    }

    let staged_len = fs::metadata(&staged).map(|m| m.len()).unwrap_or(0);
    if staged_len == 0 {
        discard_staged(&staged);
        return Err(CropError::Transcode {
            path: staged,
            reason: "encoder reported success but produced no output".to_string(),
        });
    }
    debug!("Staged crop written: {} ({} bytes)", staged.display(), staged_len);

    // Step 3: swap the new file in. rename replaces the directory entry, which
    // detaches the destination from any hard link it shared with the source.
    if let Err(e) = fs::rename(&staged, destination) {
        discard_staged(&staged);
        return Err(CropError::Replace {
            staged,
            destination: destination.to_path_buf(),
            source: e,
        });
    }

    info!("Video {} successfully cropped to {}", destination.display(), target);
    Ok(())
}

async fn crop_in_place<T: MediaTools>(
    tools: &T,
    source: &Path,
    destination: &Path,
    target: Rectangle,
) -> Result<(), CropError> {
    if same_file(source, destination) {
        return Err(CropError::Delete {
            path: destination.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "destination is the source itself; deleting it would lose the only copy",
            ),
        });
    }

    // Step 1: unlink the destination. A failed delete must stop here, since
    // writing through a surviving hard link would corrupt the source.
    if path_present(destination) {
        fs::remove_file(destination).map_err(|e| CropError::Delete {
            path: destination.to_path_buf(),
            source: e,
        })?;
        debug!("Deleted existing destination: {}", destination.display());
    }

    // Step 2: encode straight into the now-free name. On failure the
    // destination is left missing; there is nothing to restore it from.
    tools.transcode_crop(source, destination, target).await?;

    info!("Video {} successfully cropped to {}", destination.display(), target);
    Ok(())
}

fn discard_staged(staged: &Path) {
    if path_present(staged) {
        if let Err(e) = fs::remove_file(staged) {
            warn!("Failed to remove partial staged file {}: {}", staged.display(), e);
        }
    }
}
