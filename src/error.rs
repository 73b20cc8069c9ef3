use thiserror::Error;

/// Request-scoped failures of the weather state machine.
///
/// Every variant is recoverable: the server reports it as a
/// `success: false` response and the session is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("Unknown climate '{0}'")]
    UnknownClimate(String),

    #[error("Unknown season '{season}' for climate '{climate}'")]
    UnknownSeason { climate: String, season: String },

    #[error("No climate and season selected yet. Call set-weather first")]
    NotReady,

    #[error("cell must be between 1 and 19 inclusive, got {0}")]
    InvalidPosition(i64),

    #[error("dice roll must be between 2 and 14 inclusive, got {0}")]
    InvalidRoll(i64),
}

/// Malformed grid or override configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("cell {0} appears more than once in the layout")]
    DuplicateCell(u8),

    #[error("cells {0} and {1} share the same coordinate")]
    DuplicateCoordinate(u8, u8),

    #[error("layout has no cell {0}")]
    MissingCell(u8),

    #[error("boundary edge {direction} of cell {position} has no wrap target")]
    MissingWrap { position: u8, direction: String },

    #[error("override {position}·{direction}: {reason}")]
    InvalidOverride {
        position: u8,
        direction: String,
        reason: String,
    },

    #[error("{0}")]
    Parse(String),
}

/// Malformed climate or weather catalog. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("{source_name}: {message}")]
    Parse { source_name: String, message: String },

    #[error("catalog defines no climates")]
    Empty,

    #[error("duplicate climate id '{0}'")]
    DuplicateClimate(String),

    #[error("climate '{0}' defines no seasons")]
    NoSeasons(String),

    #[error("duplicate season id '{season}' in climate '{climate}'")]
    DuplicateSeason { climate: String, season: String },

    #[error("{climate}/{season}: {message}")]
    InvalidAssignment {
        climate: String,
        season: String,
        message: String,
    },
}
