pub mod config;
pub mod error;
pub mod geometry;
pub mod ffprobe;
pub mod cropdetect;
pub mod overrides;
pub mod event;
pub mod process;
pub mod tools;
pub mod executor;
pub mod orchestrator;
pub mod logging;

pub use config::{AutocropConfig, CropStrategy};
pub use error::CropError;
pub use event::{HookEvent, Manager, MediaItem, MediaKind};
pub use geometry::{is_acceptable, Rectangle, Tolerance};
pub use orchestrator::{Action, Orchestrator, Outcome, TargetSource};
pub use overrides::{OverrideKey, OverrideLookup, OverrideTable};
pub use tools::{FfmpegTools, MediaTools};
