use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::TopologyError;
use crate::flower::grid::{Direction, HexGrid, Position};

/// Looping arrows shipped with the flower.
pub const DEFAULT_FLOWER_TOML: &str = include_str!("../../data/flower.toml");

#[derive(Debug, Deserialize)]
struct OverrideFile {
    #[serde(default, rename = "override")]
    overrides: Vec<OverrideEntry>,
}

#[derive(Debug, Deserialize)]
struct OverrideEntry {
    from: Position,
    direction: Direction,
    to: Position,
}

/// Boundary edges whose exit is redirected instead of wrapping.
#[derive(Debug, Clone, Default)]
pub struct ExceptionOverrides {
    targets: HashMap<(Position, Direction), Position>,
}

impl ExceptionOverrides {
    pub fn from_file(path: &Path, grid: &HexGrid) -> Result<Self, TopologyError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TopologyError::Parse(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content, grid)
    }

    pub fn from_toml_str(content: &str, grid: &HexGrid) -> Result<Self, TopologyError> {
        let file: OverrideFile =
            toml::from_str(content).map_err(|e| TopologyError::Parse(e.to_string()))?;
        let mut overrides = ExceptionOverrides::default();
        for entry in file.overrides {
            overrides.insert(grid, entry.from, entry.direction, entry.to)?;
        }
        Ok(overrides)
    }

    /// Register one redirect. Only boundary edges may be overridden.
    pub fn insert(
        &mut self,
        grid: &HexGrid,
        from: Position,
        direction: Direction,
        to: Position,
    ) -> Result<(), TopologyError> {
        let invalid = |reason: &str| TopologyError::InvalidOverride {
            position: from.get(),
            direction: direction.to_string(),
            reason: reason.to_string(),
        };
        if direction == Direction::Stay {
            return Err(invalid("Stay cannot be overridden"));
        }
        if !grid.contains(from) || !grid.contains(to) {
            return Err(invalid("cell is not on the grid"));
        }
        if !grid.is_boundary(from, direction) {
            return Err(invalid("edge does not leave the grid"));
        }
        if self.targets.insert((from, direction), to).is_some() {
            return Err(invalid("declared more than once"));
        }
        Ok(())
    }

    pub fn get(&self, from: Position, direction: Direction) -> Option<Position> {
        self.targets.get(&(from, direction)).copied()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Resolve one move: stay, step to the neighbor, take a looping arrow, or wrap.
pub fn step(
    position: Position,
    direction: Direction,
    grid: &HexGrid,
    overrides: &ExceptionOverrides,
) -> Position {
    if direction == Direction::Stay {
        return position;
    }
    if let Some(next) = grid.neighbor(position, direction) {
        return next;
    }
    overrides
        .get(position, direction)
        .or_else(|| grid.opposite(position, direction))
        // A validated grid has a wrap target for every boundary edge.
        .unwrap_or(position)
}

/// The read-only movement rules shared by every session.
#[derive(Debug, Clone)]
pub struct FlowerRules {
    pub grid: HexGrid,
    pub overrides: ExceptionOverrides,
}

impl FlowerRules {
    /// The standard flower with its shipped looping arrows.
    pub fn standard() -> Result<Self, TopologyError> {
        let grid = HexGrid::flower()?;
        let overrides = ExceptionOverrides::from_toml_str(DEFAULT_FLOWER_TOML, &grid)?;
        Ok(FlowerRules { grid, overrides })
    }

    /// The standard flower with overrides read from `path` instead.
    pub fn with_overrides_file(path: &Path) -> Result<Self, TopologyError> {
        let grid = HexGrid::flower()?;
        let overrides = ExceptionOverrides::from_file(path, &grid)?;
        Ok(FlowerRules { grid, overrides })
    }

    pub fn step(&self, position: Position, direction: Direction) -> Position {
        step(position, direction, &self.grid, &self.overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(n: u8) -> Position {
        Position::new(n as i64).unwrap()
    }

    fn rules() -> FlowerRules {
        FlowerRules::standard().expect("shipped flower is valid")
    }

    /// Transition table of the source grid, indexed by cell then direction code 1..=6.
    const SOURCE_GRID: [[u8; 6]; 19] = [
        [3, 4, 1, 6, 2, 5],
        [5, 1, 17, 11, 4, 7],
        [6, 9, 18, 1, 5, 8],
        [7, 2, 14, 16, 1, 9],
        [8, 3, 1, 2, 7, 10],
        [1, 14, 16, 3, 8, 11],
        [10, 5, 2, 4, 9, 12],
        [11, 6, 3, 5, 10, 13],
        [12, 7, 4, 18, 3, 14],
        [13, 8, 5, 7, 12, 15],
        [2, 17, 6, 8, 13, 16],
        [15, 10, 7, 9, 14, 17],
        [16, 11, 8, 10, 15, 18],
        [17, 12, 9, 19, 6, 4],
        [18, 13, 10, 12, 17, 19],
        [4, 19, 11, 13, 18, 11],
        [19, 15, 12, 14, 11, 2],
        [9, 16, 13, 15, 19, 3],
        [19, 18, 15, 17, 19, 19],
    ];

    #[test]
    fn shipped_rules_reproduce_source_grid() {
        let r = rules();
        for (i, row) in SOURCE_GRID.iter().enumerate() {
            let from = p(i as u8 + 1);
            for (d, &expected) in Direction::EDGES.iter().zip(row) {
                assert_eq!(
                    r.step(from, *d).get(),
                    expected,
                    "cell {} direction {:?}",
                    from,
                    d
                );
            }
        }
    }

    #[test]
    fn shipped_overrides_are_the_looping_arrows() {
        let r = rules();
        assert_eq!(r.overrides.len(), 5);
        assert_eq!(r.overrides.get(p(1), Direction::Down), Some(p(1)));
        assert_eq!(r.overrides.get(p(19), Direction::Up), Some(p(19)));
        assert_eq!(r.overrides.get(p(19), Direction::UpperRight), Some(p(19)));
        assert_eq!(r.overrides.get(p(19), Direction::UpperLeft), Some(p(19)));
        assert_eq!(r.overrides.get(p(16), Direction::Up), Some(p(11)));
    }

    #[test]
    fn stay_keeps_position() {
        let r = rules();
        for pos in r.grid.positions() {
            assert_eq!(r.step(pos, Direction::Stay), pos);
        }
    }

    #[test]
    fn boundary_without_override_wraps() {
        let r = rules();
        assert!(r.grid.is_boundary(p(2), Direction::Down));
        assert_eq!(r.overrides.get(p(2), Direction::Down), None);
        assert_eq!(r.step(p(2), Direction::Down), p(17));
    }

    #[test]
    fn override_takes_precedence_over_wrap() {
        let r = rules();
        assert_eq!(r.grid.opposite(p(1), Direction::Down), Some(p(19)));
        assert_eq!(r.step(p(1), Direction::Down), p(1));
    }

    #[test]
    fn override_on_interior_edge_rejected() {
        let grid = HexGrid::flower().unwrap();
        let toml = "[[override]]\nfrom = 10\ndirection = \"Up\"\nto = 1\n";
        let err = ExceptionOverrides::from_toml_str(toml, &grid).unwrap_err();
        assert!(err.to_string().contains("does not leave the grid"));
    }

    #[test]
    fn override_on_stay_rejected() {
        let grid = HexGrid::flower().unwrap();
        let mut o = ExceptionOverrides::default();
        let err = o.insert(&grid, p(1), Direction::Stay, p(1)).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidOverride { .. }));
    }

    #[test]
    fn duplicate_override_rejected() {
        let grid = HexGrid::flower().unwrap();
        let toml = "[[override]]\nfrom = 1\ndirection = \"Down\"\nto = 1\n\
                    [[override]]\nfrom = 1\ndirection = \"Down\"\nto = 5\n";
        let err = ExceptionOverrides::from_toml_str(toml, &grid).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn override_target_out_of_range_rejected() {
        let grid = HexGrid::flower().unwrap();
        let toml = "[[override]]\nfrom = 1\ndirection = \"Down\"\nto = 20\n";
        assert!(ExceptionOverrides::from_toml_str(toml, &grid).is_err());
    }

    #[test]
    fn empty_override_file_means_plain_wraparound() {
        let grid = HexGrid::flower().unwrap();
        let overrides = ExceptionOverrides::from_toml_str("", &grid).unwrap();
        assert!(overrides.is_empty());
        assert_eq!(step(p(1), Direction::Down, &grid, &overrides), p(19));
    }

    #[test]
    fn overrides_file_loads_from_disk() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(tmp, "[[override]]\nfrom = 2\ndirection = \"Down\"\nto = 2").unwrap();
        let r = FlowerRules::with_overrides_file(tmp.path()).unwrap();
        assert_eq!(r.step(p(2), Direction::Down), p(2));
    }
}
