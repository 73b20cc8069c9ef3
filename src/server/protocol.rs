use serde::Serialize;
use serde_json::{Map, Value};

use crate::catalog::{WeatherAssignment, WeatherCatalog};
use crate::flower::{DiceRoll, Direction};

/// `GET /api/climates`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateList {
    pub success: bool,
    pub climates: Map<String, Value>,
    pub climate_order: Vec<String>,
    pub default_climate: String,
}

/// `GET /api/seasons`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonList {
    pub success: bool,
    pub seasons: Map<String, Value>,
    pub season_order: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_season: Option<String>,
}

/// Bare success acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct Ack {
    pub success: bool,
}

/// Description and effects for the label on a cell.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherDetail {
    pub description: String,
    pub effects: Map<String, Value>,
}

impl WeatherDetail {
    pub fn lookup(weather: &WeatherCatalog, label: &str) -> Self {
        WeatherDetail {
            description: weather.describe(label).to_string(),
            effects: weather.effects(label),
        }
    }
}

/// `POST /api/set-cell` and `POST /api/reset`
#[derive(Debug, Clone, Serialize)]
pub struct CellState {
    pub success: bool,
    pub cell: u8,
    pub state: String,
    #[serde(flatten)]
    pub detail: WeatherDetail,
}

/// `GET /api/current-state`
#[derive(Debug, Clone, Serialize)]
pub struct CurrentState {
    pub success: bool,
    pub climate: String,
    pub season: String,
    #[serde(rename = "seasonDescription", skip_serializing_if = "Option::is_none")]
    pub season_description: Option<String>,
    pub cell: u8,
    pub state: String,
    #[serde(flatten)]
    pub detail: WeatherDetail,
    /// Every cell's label, keyed by cell number.
    pub states: Map<String, Value>,
}

/// `POST /api/transition`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
    pub success: bool,
    pub from: u8,
    pub cell: u8,
    pub state: String,
    pub direction: Direction,
    pub direction_code: u8,
    pub roll: DiceRoll,
    #[serde(flatten)]
    pub detail: WeatherDetail,
}

/// `GET /api/debug-info`
#[derive(Debug, Clone, Serialize)]
pub struct DebugInfo {
    pub debug: bool,
    pub environment: String,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub sessions: usize,
    pub climates: usize,
}

/// Any failure.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub success: bool,
    pub error: String,
}

impl Failure {
    pub fn new(error: impl Into<String>) -> Self {
        Failure {
            success: false,
            error: error.into(),
        }
    }
}

/// Ordered `{id: display name}` object.
pub fn name_map<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(id, name)| (id.to_string(), Value::String(name.to_string())))
        .collect()
}

pub fn states_map(assignment: &WeatherAssignment) -> Map<String, Value> {
    assignment
        .iter()
        .map(|(cell, label)| (cell.to_string(), Value::String(label.to_string())))
        .collect()
}
