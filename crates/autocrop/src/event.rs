use std::collections::HashMap;
use std::path::PathBuf;
use crate::error::CropError;
use crate::overrides::OverrideKey;

/// Which library manager fired the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manager {
    Sonarr,
    Radarr,
}

impl Manager {
    fn prefix(self) -> &'static str {
        match self {
            Manager::Sonarr => "sonarr",
            Manager::Radarr => "radarr",
        }
    }
}

/// Episodic content carries a season; movies do not
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Episode { season: u32, episodes: Option<String> },
    Movie,
}

/// The file pair one hook invocation is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub title: String,
    pub kind: MediaKind,
    /// Newly delivered file (download/import source)
    pub source_path: PathBuf,
    /// Library file that should end up cropped
    pub destination_path: PathBuf,
    pub is_upgrade: bool,
}

impl MediaItem {
    pub fn override_key(&self) -> OverrideKey {
        match &self.kind {
            MediaKind::Episode { season, .. } => OverrideKey::episode(self.title.clone(), *season),
            MediaKind::Movie => OverrideKey::movie(self.title.clone()),
        }
    }

    /// Human-readable label, e.g. `Show X S2E5` or `The Film`
    pub fn label(&self) -> String {
        match &self.kind {
            MediaKind::Episode { season, episodes: Some(episodes) } => {
                format!("{} S{}E{}", self.title, season, episodes)
            }
            MediaKind::Episode { season, episodes: None } => format!("{} S{}", self.title, season),
            MediaKind::Movie => self.title.clone(),
        }
    }
}

/// A validated hook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    /// The "Test" event sent when a connection is saved; nothing to process
    Test(Manager),
    /// A file was imported or upgraded
    Import { manager: Manager, item: MediaItem },
}

impl HookEvent {
    /// Build an event from the process environment
    pub fn from_env() -> Result<Self, CropError> {
        Self::from_vars(std::env::vars())
    }

    /// Build an event from `sonarr_*` / `radarr_*` variables.
    ///
    /// The manager is chosen by which `*_eventtype` variable carries a value,
    /// Sonarr first. Required fields that are missing or blank reject the
    /// event before anything touches the filesystem.
    pub fn from_vars<I>(vars: I) -> Result<Self, CropError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with("sonarr_") || k.starts_with("radarr_"))
            .collect();
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let manager = if get("sonarr_eventtype").is_some() {
            Manager::Sonarr
        } else if get("radarr_eventtype").is_some() {
            Manager::Radarr
        } else {
            return Err(CropError::InvalidEvent(
                "neither sonarr_eventtype nor radarr_eventtype is set".to_string(),
            ));
        };

        let event_type = get(format!("{}_eventtype", manager.prefix()).as_str()).unwrap_or_default();
        if event_type.eq_ignore_ascii_case("test") {
            return Ok(HookEvent::Test(manager));
        }

        let require = |name: &str| {
            get(name)
                .map(str::to_string)
                .ok_or_else(|| CropError::InvalidEvent(format!("missing required variable {}", name)))
        };
        let is_upgrade = get(format!("{}_isupgrade", manager.prefix()).as_str())
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let item = match manager {
            Manager::Sonarr => {
                let season_raw = require("sonarr_episodefile_seasonnumber")?;
                let season = season_raw.parse::<u32>().map_err(|_| {
                    CropError::InvalidEvent(format!("season number is not numeric: {}", season_raw))
                })?;
                MediaItem {
                    title: require("sonarr_series_title")?,
                    kind: MediaKind::Episode {
                        season,
                        episodes: get("sonarr_episodefile_episodenumbers").map(str::to_string),
                    },
                    source_path: PathBuf::from(require("sonarr_episodefile_sourcepath")?),
                    destination_path: PathBuf::from(require("sonarr_episodefile_path")?),
                    is_upgrade,
                }
            }
            Manager::Radarr => MediaItem {
                title: require("radarr_movie_title")?,
                kind: MediaKind::Movie,
                source_path: PathBuf::from(require("radarr_moviefile_sourcepath")?),
                destination_path: PathBuf::from(require("radarr_moviefile_path")?),
                is_upgrade,
            },
        };

        Ok(HookEvent::Import { manager, item })
    }
}
