pub mod weather;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::{CatalogError, WeatherError};
use crate::flower::{Position, CELL_COUNT};

pub use weather::WeatherCatalog;

/// Climate catalog shipped with the binary.
pub const DEFAULT_CLIMATES_TOML: &str = include_str!("../../data/climates.toml");

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default, rename = "climate")]
    climates: Vec<RawClimate>,
}

#[derive(Debug, Deserialize)]
struct RawClimate {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "season")]
    seasons: Vec<RawSeason>,
}

#[derive(Debug, Deserialize)]
struct RawSeason {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_start")]
    start: i64,
    #[serde(default)]
    states: BTreeMap<String, String>,
}

fn default_start() -> i64 {
    1
}

/// Weather label on every cell of the flower, plus the cell a session starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherAssignment {
    labels: Vec<String>,
    initial: Position,
}

impl WeatherAssignment {
    pub fn initial(&self) -> Position {
        self.initial
    }

    pub fn label(&self, position: Position) -> &str {
        &self.labels[(position.get() - 1) as usize]
    }

    /// `(position, label)` for every cell in cell order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &str)> {
        self.labels.iter().enumerate().filter_map(|(i, label)| {
            Position::new(i as i64 + 1)
                .ok()
                .map(|p| (p, label.as_str()))
        })
    }
}

#[derive(Debug, Clone)]
pub struct Season {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub assignment: WeatherAssignment,
}

#[derive(Debug, Clone)]
pub struct Climate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub seasons: Vec<Season>,
}

impl Climate {
    pub fn season(&self, season_id: &str) -> Option<&Season> {
        self.seasons.iter().find(|s| s.id == season_id)
    }
}

/// Ordered, immutable set of climates and their seasons.
#[derive(Debug, Clone)]
pub struct ClimateCatalog {
    climates: Vec<Climate>,
}

impl ClimateCatalog {
    /// The catalog shipped with the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(DEFAULT_CLIMATES_TOML, "builtin climates")
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Parse {
            source_name: path.display().to_string(),
            message: format!("Cannot read: {}", e),
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str, source_name: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content).map_err(|e| CatalogError::Parse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;

        if file.climates.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut climate_ids = HashSet::new();
        let mut climates = Vec::with_capacity(file.climates.len());
        for raw in file.climates {
            if !climate_ids.insert(raw.id.clone()) {
                return Err(CatalogError::DuplicateClimate(raw.id));
            }
            if raw.seasons.is_empty() {
                return Err(CatalogError::NoSeasons(raw.id));
            }

            let mut season_ids = HashSet::new();
            let mut seasons = Vec::with_capacity(raw.seasons.len());
            for season in raw.seasons {
                if !season_ids.insert(season.id.clone()) {
                    return Err(CatalogError::DuplicateSeason {
                        climate: raw.id,
                        season: season.id,
                    });
                }
                let assignment = build_assignment(&raw.id, &season)?;
                seasons.push(Season {
                    id: season.id,
                    name: season.name,
                    description: season.description,
                    assignment,
                });
            }

            climates.push(Climate {
                id: raw.id,
                name: raw.name,
                description: raw.description,
                seasons,
            });
        }

        Ok(ClimateCatalog { climates })
    }

    /// `(id, display name)` in catalog order.
    pub fn list_climates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.climates.iter().map(|c| (c.id.as_str(), c.name.as_str()))
    }

    pub fn climate(&self, climate_id: &str) -> Result<&Climate, WeatherError> {
        self.climates
            .iter()
            .find(|c| c.id == climate_id)
            .ok_or_else(|| WeatherError::UnknownClimate(climate_id.to_string()))
    }

    /// `(id, display name)` of the climate's seasons in declared order.
    pub fn list_seasons(&self, climate_id: &str) -> Result<Vec<(&str, &str)>, WeatherError> {
        let climate = self.climate(climate_id)?;
        Ok(climate
            .seasons
            .iter()
            .map(|s| (s.id.as_str(), s.name.as_str()))
            .collect())
    }

    pub fn season(&self, climate_id: &str, season_id: &str) -> Result<&Season, WeatherError> {
        self.climate(climate_id)?
            .season(season_id)
            .ok_or_else(|| WeatherError::UnknownSeason {
                climate: climate_id.to_string(),
                season: season_id.to_string(),
            })
    }

    /// The assignment for a (climate, season) pair with the season's description.
    pub fn get_assignment(
        &self,
        climate_id: &str,
        season_id: &str,
    ) -> Result<(&WeatherAssignment, Option<&str>), WeatherError> {
        let season = self.season(climate_id, season_id)?;
        Ok((&season.assignment, season.description.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.climates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.climates.is_empty()
    }
}

fn build_assignment(
    climate_id: &str,
    season: &RawSeason,
) -> Result<WeatherAssignment, CatalogError> {
    let invalid = |message: String| CatalogError::InvalidAssignment {
        climate: climate_id.to_string(),
        season: season.id.clone(),
        message,
    };

    let mut labels: Vec<Option<String>> = vec![None; CELL_COUNT as usize];
    for (key, label) in &season.states {
        let cell: i64 = key
            .trim()
            .parse()
            .map_err(|_| invalid(format!("state key '{}' is not a cell number", key)))?;
        let position = Position::new(cell).map_err(|e| invalid(e.to_string()))?;
        if label.trim().is_empty() {
            return Err(invalid(format!("cell {} has an empty label", cell)));
        }
        let slot = &mut labels[(position.get() - 1) as usize];
        if slot.is_some() {
            return Err(invalid(format!("cell {} is assigned twice", cell)));
        }
        *slot = Some(label.clone());
    }

    let missing: Vec<String> = labels
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_none())
        .map(|(i, _)| (i + 1).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(invalid(format!("no weather for cells {}", missing.join(", "))));
    }

    let initial = Position::new(season.start)
        .map_err(|_| invalid(format!("start cell {} is off the flower", season.start)))?;

    Ok(WeatherAssignment {
        labels: labels.into_iter().flatten().collect(),
        initial,
    })
}
