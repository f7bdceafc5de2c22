use std::fmt;
use std::io::Read;
use std::path::Path;
use log::{debug, warn};
use serde::Deserialize;
use crate::error::CropError;
use crate::geometry::Rectangle;

/// Lookup key: a series title with its season, or a movie title alone
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverrideKey {
    pub title: String,
    pub season: Option<u32>,
}

impl OverrideKey {
    pub fn episode(title: impl Into<String>, season: u32) -> Self {
        OverrideKey { title: title.into(), season: Some(season) }
    }

    pub fn movie(title: impl Into<String>) -> Self {
        OverrideKey { title: title.into(), season: None }
    }
}

impl fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.season {
            Some(season) => write!(f, "{} season {}", self.title, season),
            None => write!(f, "{}", self.title),
        }
    }
}

/// One row of a manual crop table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideRow {
    pub key: OverrideKey,
    pub target: Rectangle,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "Series", alias = "Movie", alias = "Title")]
    title: String,
    #[serde(rename = "Season", default)]
    season: Option<u32>,
    #[serde(rename = "Horizontal")]
    horizontal: u32,
    #[serde(rename = "Vertical")]
    vertical: u32,
}

/// Result of looking a key up in an [`OverrideTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideLookup {
    Found(Rectangle),
    Missing,
    /// More than one row matched; treated like a miss
    Ambiguous(usize),
}

impl OverrideLookup {
    pub fn rectangle(self) -> Option<Rectangle> {
        match self {
            OverrideLookup::Found(rect) => Some(rect),
            OverrideLookup::Missing | OverrideLookup::Ambiguous(_) => None,
        }
    }
}

/// Manually specified crop targets, read once and never modified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTable {
    rows: Vec<OverrideRow>,
}

impl OverrideTable {
    pub fn new(rows: Vec<OverrideRow>) -> Self {
        OverrideTable { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Load a CSV table. A missing path (not configured) gives an empty table.
    pub fn load(path: Option<&Path>) -> Result<Self, CropError> {
        let Some(path) = path else {
            return Ok(OverrideTable::default());
        };

        let file = std::fs::File::open(path).map_err(|e| CropError::OverrideTable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let table = Self::from_reader(file).map_err(|e| match e {
            CropError::OverrideTable { reason, .. } => CropError::OverrideTable {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;

        debug!("Loaded {} override rows from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse CSV with a header row. Title column may be named `Series`,
    /// `Movie` or `Title`; `Season` may be absent or blank.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CropError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for record in csv_reader.deserialize::<CsvRow>() {
            let row = record.map_err(|e| CropError::OverrideTable {
                path: Default::default(),
                reason: e.to_string(),
            })?;
            let target = Rectangle::new(row.horizontal, row.vertical).map_err(|e| CropError::OverrideTable {
                path: Default::default(),
                reason: format!("row {} ({}): {}", rows.len() + 1, row.title, e),
            })?;
            rows.push(OverrideRow {
                key: OverrideKey { title: row.title, season: row.season },
                target,
            });
        }

        Ok(OverrideTable { rows })
    }

    /// Look `key` up by exact title and season match
    pub fn lookup(&self, key: &OverrideKey) -> OverrideLookup {
        let matches: Vec<&OverrideRow> = self.rows.iter().filter(|row| row.key == *key).collect();
        match matches.as_slice() {
            [] => OverrideLookup::Missing,
            [row] => OverrideLookup::Found(row.target),
            many => OverrideLookup::Ambiguous(many.len()),
        }
    }

    /// The override target for `key`, if exactly one row matches
    pub fn resolve(&self, key: &OverrideKey) -> Option<Rectangle> {
        let lookup = self.lookup(key);
        match lookup {
            OverrideLookup::Found(rect) => debug!("{} found in database with {} resolution.", key, rect),
            OverrideLookup::Missing => debug!("{} not found in database.", key),
            OverrideLookup::Ambiguous(n) => {
                warn!("{} matches {} override rows; ignoring them and detecting automatically", key, n)
            }
        }
        lookup.rectangle()
    }
}
