//! Per-invocation crop decision.
//!
//! One linear pass: validate inputs, resolve the target (override table or
//! automatic detection), compare it with the current resolution, then skip
//! or crop. Any failure ends the run; nothing is retried.

use std::path::Path;
use log::{debug, info};
use crate::config::{AutocropConfig, CropStrategy};
use crate::cropdetect;
use crate::error::CropError;
use crate::event::MediaItem;
use crate::executor;
use crate::geometry::{is_acceptable, Rectangle, Tolerance};
use crate::overrides::OverrideTable;
use crate::tools::MediaTools;

/// Where the crop target came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Override,
    Detected,
}

/// What the run did to the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Already within tolerance; destination not written
    Skipped,
    /// Destination replaced with a cropped encode
    Cropped,
}

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub target_source: TargetSource,
    pub target: Rectangle,
    pub current: Rectangle,
    pub action: Action,
}

/// Drives one crop decision with explicitly supplied configuration
pub struct Orchestrator<'a, T: MediaTools> {
    tools: &'a T,
    overrides: &'a OverrideTable,
    tolerance: Tolerance,
    strategy: CropStrategy,
}

impl<'a, T: MediaTools> Orchestrator<'a, T> {
    pub fn new(tools: &'a T, overrides: &'a OverrideTable, tolerance: Tolerance, strategy: CropStrategy) -> Self {
        Orchestrator { tools, overrides, tolerance, strategy }
    }

    pub fn from_config(tools: &'a T, overrides: &'a OverrideTable, cfg: &AutocropConfig) -> Self {
        Self::new(tools, overrides, cfg.tolerance, cfg.strategy)
    }

    pub async fn run(&self, item: &MediaItem) -> Result<Outcome, CropError> {
        // START: both files must exist
        require_exists(&item.destination_path)?;
        require_exists(&item.source_path)?;
        debug!("Video files paths are valid.");

        // RESOLVING_TARGET
        let (target_source, target) = match self.overrides.resolve(&item.override_key()) {
            Some(rect) => {
                info!("{}: using manual crop {} from override table", item.label(), rect);
                (TargetSource::Override, rect)
            }
            None => {
                debug!("{} not found in database. Getting crop parameters automatically.", item.label());
                let rect = cropdetect::detect(self.tools, &item.source_path).await?;
                info!("{}: detected crop {}", item.label(), rect);
                (TargetSource::Detected, rect)
            }
        };

        // COMPARING
        let current = self.tools.probe_resolution(&item.source_path).await?;
        debug!(
            "Video {} has resolution {} and should be {} within a tolerance of ±{}.",
            item.source_path.display(),
            current,
            target,
            self.tolerance.0
        );

        if is_acceptable(current, target, self.tolerance) {
            info!("Video already in the specified resolution. Skipping...");
            return Ok(Outcome { target_source, target, current, action: Action::Skipped });
        }

        // CROPPING
        info!("Beginning crop: {} -> {}", current, target);
        executor::crop(self.tools, &item.source_path, &item.destination_path, target, self.strategy).await?;

        Ok(Outcome { target_source, target, current, action: Action::Cropped })
    }
}

fn require_exists(path: &Path) -> Result<(), CropError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CropError::MissingInput { path: path.to_path_buf() })
    }
}
