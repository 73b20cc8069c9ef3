pub mod store;

use serde::Serialize;

use crate::catalog::{ClimateCatalog, WeatherAssignment};
use crate::error::WeatherError;
use crate::flower::{DiceRoll, DiceSource, Direction, FlowerRules, Position, TransitionTable};

pub use store::{SessionStore, Slot, StoreLimits};

/// Where a session currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state")]
pub enum SessionState {
    Uninitialized,
    Ready {
        climate: String,
        season: String,
        position: Position,
    },
}

/// Result of one dice-driven move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: Position,
    pub to: Position,
    pub direction: Direction,
    pub roll: DiceRoll,
    pub label: String,
}

/// One client's walk over the flower.
///
/// Every operation either succeeds and commits its new state, or fails and
/// leaves the session exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherSession {
    state: SessionState,
}

impl Default for WeatherSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherSession {
    pub fn new() -> Self {
        WeatherSession {
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready { .. })
    }

    pub fn position(&self) -> Option<Position> {
        match &self.state {
            SessionState::Ready { position, .. } => Some(*position),
            SessionState::Uninitialized => None,
        }
    }

    /// `(climate, season)` of a Ready session.
    pub fn selection(&self) -> Option<(&str, &str)> {
        match &self.state {
            SessionState::Ready {
                climate, season, ..
            } => Some((climate.as_str(), season.as_str())),
            SessionState::Uninitialized => None,
        }
    }

    /// Switch to a (climate, season) pair and move to its start cell.
    pub fn select_season(
        &mut self,
        catalog: &ClimateCatalog,
        climate: &str,
        season: &str,
    ) -> Result<Position, WeatherError> {
        let (assignment, _) = catalog.get_assignment(climate, season)?;
        let start = assignment.initial();
        self.state = SessionState::Ready {
            climate: climate.to_string(),
            season: season.to_string(),
            position: start,
        };
        Ok(start)
    }

    /// Return to the start cell of the current assignment.
    pub fn reset(&mut self, catalog: &ClimateCatalog) -> Result<Position, WeatherError> {
        let start = self.assignment(catalog)?.initial();
        self.set_position(start);
        Ok(start)
    }

    /// Move straight to `cell` without consulting the dice.
    pub fn jump_to(&mut self, cell: i64) -> Result<Position, WeatherError> {
        if !self.is_ready() {
            return Err(WeatherError::NotReady);
        }
        let target = Position::new(cell)?;
        self.set_position(target);
        Ok(target)
    }

    /// Apply a known d6+d8 total.
    pub fn roll_transition(
        &mut self,
        rules: &FlowerRules,
        catalog: &ClimateCatalog,
        total: i64,
    ) -> Result<Transition, WeatherError> {
        let roll = DiceRoll::from_total(total);
        self.apply(rules, catalog, roll)
    }

    /// Throw the dice and apply the result.
    pub fn roll(
        &mut self,
        rules: &FlowerRules,
        catalog: &ClimateCatalog,
        dice: &mut impl DiceSource,
    ) -> Result<Transition, WeatherError> {
        if !self.is_ready() {
            return Err(WeatherError::NotReady);
        }
        let roll = DiceRoll::throw(dice);
        self.apply(rules, catalog, Ok(roll))
    }

    fn apply(
        &mut self,
        rules: &FlowerRules,
        catalog: &ClimateCatalog,
        roll: Result<DiceRoll, WeatherError>,
    ) -> Result<Transition, WeatherError> {
        let from = self.position().ok_or(WeatherError::NotReady)?;
        let roll = roll?;
        let direction = TransitionTable::resolve(roll.total as i64)?;
        let to = rules.step(from, direction);
        let label = self.assignment(catalog)?.label(to).to_string();
        self.set_position(to);
        Ok(Transition {
            from,
            to,
            direction,
            roll,
            label,
        })
    }

    /// Label of the current cell.
    pub fn current_weather<'c>(
        &self,
        catalog: &'c ClimateCatalog,
    ) -> Result<&'c str, WeatherError> {
        let position = self.position().ok_or(WeatherError::NotReady)?;
        Ok(self.assignment(catalog)?.label(position))
    }

    /// The assignment the session is walking.
    pub fn assignment<'c>(
        &self,
        catalog: &'c ClimateCatalog,
    ) -> Result<&'c WeatherAssignment, WeatherError> {
        let (climate, season) = self.selection().ok_or(WeatherError::NotReady)?;
        catalog.get_assignment(climate, season).map(|(a, _)| a)
    }

    fn set_position(&mut self, target: Position) {
        if let SessionState::Ready { position, .. } = &mut self.state {
            *position = target;
        }
    }
}
