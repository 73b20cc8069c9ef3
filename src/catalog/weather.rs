use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::CatalogError;

/// Weather descriptions shipped with the binary.
pub const DEFAULT_WEATHER_TOML: &str = include_str!("../../data/weather.toml");

pub const NO_DESCRIPTION: &str = "No description available for this weather type.";

#[derive(Debug, Clone, Deserialize)]
struct WeatherEntry {
    #[serde(default)]
    description: Option<String>,
    #[serde(flatten)]
    effects: Map<String, Value>,
}

/// Descriptive text and table effects for each weather label.
///
/// Lookups never fail: a label with no entry gets the stock description
/// and an empty effect set.
#[derive(Debug, Clone, Default)]
pub struct WeatherCatalog {
    entries: BTreeMap<String, WeatherEntry>,
}

impl WeatherCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(DEFAULT_WEATHER_TOML, "builtin weather")
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|e| CatalogError::Parse {
            source_name: path.display().to_string(),
            message: format!("Cannot read: {}", e),
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    pub fn from_toml_str(content: &str, source_name: &str) -> Result<Self, CatalogError> {
        let entries = toml::from_str(content).map_err(|e| CatalogError::Parse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        Ok(WeatherCatalog { entries })
    }

    pub fn describe(&self, label: &str) -> &str {
        self.entries
            .get(label)
            .and_then(|e| e.description.as_deref())
            .unwrap_or(NO_DESCRIPTION)
    }

    /// Every key of the entry except `description`.
    pub fn effects(&self, label: &str) -> Map<String, Value> {
        self.entries
            .get(label)
            .map(|e| e.effects.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }
}
