use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TopologyError, WeatherError};

/// Number of cells in the flower: a centre, a ring of 6 and a ring of 12.
pub const CELL_COUNT: u8 = 19;

/// Ring count around the centre cell.
const RADIUS: i32 = 2;

/// Columns of the flower, left to right, each listed bottom to top.
///
/// Column `q` holds the cells whose axial row `r` satisfies the hexagon
/// bound `max(|q|, |r|, |q + r|) <= RADIUS`.
const COLUMNS: [(i32, &[u8]); 5] = [
    (-2, &[4, 9, 14]),
    (-1, &[2, 7, 12, 17]),
    (0, &[1, 5, 10, 15, 19]),
    (1, &[3, 8, 13, 18]),
    (2, &[6, 11, 16]),
];

/// One cell of the flower, numbered 1..=19.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Position(u8);

impl Position {
    pub fn new(cell: i64) -> Result<Self, WeatherError> {
        if (1..=CELL_COUNT as i64).contains(&cell) {
            Ok(Position(cell as u8))
        } else {
            Err(WeatherError::InvalidPosition(cell))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

impl TryFrom<u8> for Position {
    type Error = WeatherError;

    fn try_from(cell: u8) -> Result<Self, Self::Error> {
        Position::new(cell as i64)
    }
}

impl From<Position> for u8 {
    fn from(p: Position) -> u8 {
        p.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a transition: one of the six hex edges, or staying put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    UpperRight,
    LowerRight,
    Down,
    Stay,
    LowerLeft,
    UpperLeft,
    Up,
}

impl Direction {
    /// The six edge directions, in clockwise order from upper right.
    pub const EDGES: [Direction; 6] = [
        Direction::UpperRight,
        Direction::LowerRight,
        Direction::Down,
        Direction::LowerLeft,
        Direction::UpperLeft,
        Direction::Up,
    ];

    /// Wire code: 0 for Stay, 1..=6 for the edges in `EDGES` order.
    pub fn code(self) -> u8 {
        match self {
            Direction::Stay => 0,
            Direction::UpperRight => 1,
            Direction::LowerRight => 2,
            Direction::Down => 3,
            Direction::LowerLeft => 4,
            Direction::UpperLeft => 5,
            Direction::Up => 6,
        }
    }

    /// Axial `(dq, dr)` offset for a flat-top layout. `None` for Stay.
    fn offset(self) -> Option<(i32, i32)> {
        match self {
            Direction::UpperRight => Some((1, -1)),
            Direction::LowerRight => Some((1, 0)),
            Direction::Down => Some((0, 1)),
            Direction::LowerLeft => Some((-1, 1)),
            Direction::UpperLeft => Some((-1, 0)),
            Direction::Up => Some((0, -1)),
            Direction::Stay => None,
        }
    }

    fn edge_index(self) -> Option<usize> {
        match self {
            Direction::Stay => None,
            other => Some(other.code() as usize - 1),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Flat-top axial coordinate `(q, r)`.
pub type Axial = (i32, i32);

/// Fixed hexagonal topology of the weather flower.
///
/// Built once and validated at startup. Every lookup afterwards is a table
/// read, so a shared `&HexGrid` is safe to use from any number of tasks.
#[derive(Debug, Clone)]
pub struct HexGrid {
    coords: Vec<Axial>,
    neighbors: Vec<[Option<Position>; 6]>,
    wraps: Vec<[Option<Position>; 6]>,
}

impl HexGrid {
    /// The standard 19-cell flower.
    pub fn flower() -> Result<Self, TopologyError> {
        let mut cells = Vec::with_capacity(CELL_COUNT as usize);
        for &(q, column) in &COLUMNS {
            let bottom = RADIUS.min(RADIUS - q);
            for (i, &cell) in column.iter().enumerate() {
                cells.push((cell, (q, bottom - i as i32)));
            }
        }
        Self::from_layout(&cells)
    }

    /// Build a grid from explicit `(cell, (q, r))` pairs and validate it.
    ///
    /// The layout must number its cells exactly 1..=19 with distinct
    /// coordinates. Neighbors come from coordinate adjacency. Wrap targets come
    /// from walking back along the line of travel to the far edge.
    pub fn from_layout(cells: &[(u8, Axial)]) -> Result<Self, TopologyError> {
        let mut coords: Vec<Option<Axial>> = vec![None; CELL_COUNT as usize];
        let mut index: HashMap<Axial, Position> = HashMap::new();

        for &(cell, axial) in cells {
            let position =
                Position::new(cell as i64).map_err(|e| TopologyError::Parse(e.to_string()))?;
            if coords[position.index()].is_some() {
                return Err(TopologyError::DuplicateCell(cell));
            }
            if let Some(other) = index.insert(axial, position) {
                return Err(TopologyError::DuplicateCoordinate(other.get(), cell));
            }
            coords[position.index()] = Some(axial);
        }

        let coords: Vec<Axial> = coords
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.ok_or(TopologyError::MissingCell(i as u8 + 1)))
            .collect::<Result<_, _>>()?;

        let mut neighbors = vec![[None; 6]; coords.len()];
        let mut wraps = vec![[None; 6]; coords.len()];

        for (i, &(q, r)) in coords.iter().enumerate() {
            for direction in Direction::EDGES {
                let Some((dq, dr)) = direction.offset() else {
                    continue;
                };
                let Some(slot) = direction.edge_index() else {
                    continue;
                };
                if let Some(&next) = index.get(&(q + dq, r + dr)) {
                    neighbors[i][slot] = Some(next);
                    continue;
                }
                let (mut bq, mut br) = (q, r);
                while index.contains_key(&(bq - dq, br - dr)) {
                    bq -= dq;
                    br -= dr;
                }
                wraps[i][slot] = index.get(&(bq, br)).copied();
            }
        }

        let grid = HexGrid {
            coords,
            neighbors,
            wraps,
        };
        grid.validate()?;
        Ok(grid)
    }

    fn validate(&self) -> Result<(), TopologyError> {
        for position in self.positions() {
            for direction in Direction::EDGES {
                if self.is_boundary(position, direction) {
                    let Some(target) = self.opposite(position, direction) else {
                        return Err(TopologyError::MissingWrap {
                            position: position.get(),
                            direction: direction.to_string(),
                        });
                    };
                    if !self.is_boundary(target, reverse(direction)) {
                        return Err(TopologyError::Parse(format!(
                            "wrap target {} of cell {} going {} is not on the far edge",
                            target, position, direction
                        )));
                    }
                }
                if let Some(next) = self.neighbor(position, direction) {
                    let back = self.neighbor(next, reverse(direction));
                    if back != Some(position) {
                        return Err(TopologyError::Parse(format!(
                            "cells {} and {} are not mutual neighbors",
                            position, next
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// All positions, in cell-number order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (1..=self.coords.len() as u8).map(Position)
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn contains(&self, position: Position) -> bool {
        position.index() < self.coords.len()
    }

    /// Adjacent cell in `direction`. `None` for Stay and for edges that
    /// leave the grid.
    pub fn neighbor(&self, position: Position, direction: Direction) -> Option<Position> {
        let slot = direction.edge_index()?;
        self.neighbors.get(position.index())?[slot]
    }

    /// Whether moving from `position` in `direction` would leave the grid.
    pub fn is_boundary(&self, position: Position, direction: Direction) -> bool {
        direction != Direction::Stay && self.neighbor(position, direction).is_none()
    }

    /// Default wraparound target for a boundary move: the cell diametrically
    /// opposite along the line of travel. `None` when the move stays on the grid.
    pub fn opposite(&self, position: Position, direction: Direction) -> Option<Position> {
        let slot = direction.edge_index()?;
        self.wraps.get(position.index())?[slot]
    }
}

fn reverse(direction: Direction) -> Direction {
    match direction {
        Direction::UpperRight => Direction::LowerLeft,
        Direction::LowerRight => Direction::UpperLeft,
        Direction::Down => Direction::Up,
        Direction::LowerLeft => Direction::UpperRight,
        Direction::UpperLeft => Direction::LowerRight,
        Direction::Up => Direction::Down,
        Direction::Stay => Direction::Stay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> HexGrid {
        HexGrid::flower().expect("flower topology is valid")
    }

    fn p(n: u8) -> Position {
        Position::new(n as i64).unwrap()
    }

    #[test]
    fn flower_has_nineteen_cells() {
        let g = grid();
        assert_eq!(g.len(), 19);
        assert_eq!(g.positions().count(), 19);
        assert!(g.positions().all(|pos| g.contains(pos)));
    }

    #[test]
    fn centre_cell_has_six_neighbors() {
        let g = grid();
        let centre = p(10);
        let neighbors: Vec<u8> = Direction::EDGES
            .iter()
            .map(|&d| g.neighbor(centre, d).unwrap().get())
            .collect();
        assert_eq!(neighbors, vec![13, 8, 5, 7, 12, 15]);
    }

    #[test]
    fn inner_ring_has_no_boundary_edges() {
        let g = grid();
        for cell in [5, 7, 8, 12, 13, 15] {
            for d in Direction::EDGES {
                assert!(!g.is_boundary(p(cell), d), "cell {} {:?}", cell, d);
            }
        }
    }

    #[test]
    fn outer_ring_has_boundary_edges() {
        let g = grid();
        let outer = [1, 2, 3, 4, 6, 9, 11, 14, 16, 17, 18, 19];
        for cell in outer {
            let count = Direction::EDGES
                .iter()
                .filter(|&&d| g.is_boundary(p(cell), d))
                .count();
            assert!(count == 2 || count == 3, "cell {} has {} boundary edges", cell, count);
        }
    }

    #[test]
    fn stay_is_never_a_boundary() {
        let g = grid();
        for pos in g.positions() {
            assert!(!g.is_boundary(pos, Direction::Stay));
            assert_eq!(g.neighbor(pos, Direction::Stay), None);
            assert_eq!(g.opposite(pos, Direction::Stay), None);
        }
    }

    #[test]
    fn wrap_follows_the_line_of_travel() {
        let g = grid();
        assert_eq!(g.opposite(p(1), Direction::LowerRight), Some(p(4)));
        assert_eq!(g.opposite(p(1), Direction::LowerLeft), Some(p(6)));
        assert_eq!(g.opposite(p(1), Direction::Down), Some(p(19)));
        assert_eq!(g.opposite(p(2), Direction::Down), Some(p(17)));
        assert_eq!(g.opposite(p(11), Direction::UpperRight), Some(p(2)));
        assert_eq!(g.opposite(p(14), Direction::LowerLeft), Some(p(19)));
    }

    #[test]
    fn opposite_is_none_for_interior_moves() {
        let g = grid();
        assert_eq!(g.opposite(p(10), Direction::Up), None);
        assert_eq!(g.opposite(p(1), Direction::Up), None);
    }

    #[test]
    fn every_wrap_lands_on_the_far_edge() {
        let grid = grid();
        for position in grid.positions() {
            for direction in Direction::EDGES {
                if let Some(target) = grid.opposite(position, direction) {
                    assert!(
                        grid.is_boundary(target, reverse(direction)),
                        "{} going {} wraps to {}",
                        position,
                        direction,
                        target
                    );
                }
            }
        }
    }

    #[test]
    fn wrap_into_interior_fails_validation() {
        let mut g = grid();
        let slot = Direction::Down.code() as usize - 1;
        g.wraps[p(1).index()][slot] = Some(p(10));
        let err = g.validate().unwrap_err();
        assert!(err.to_string().contains("not on the far edge"), "{}", err);
    }

    #[test]
    fn neighbors_are_mutual() {
        let g = grid();
        for pos in g.positions() {
            for d in Direction::EDGES {
                if let Some(next) = g.neighbor(pos, d) {
                    assert_eq!(g.neighbor(next, reverse(d)), Some(pos));
                }
            }
        }
    }

    #[test]
    fn position_range_is_enforced() {
        assert_eq!(Position::new(0), Err(WeatherError::InvalidPosition(0)));
        assert_eq!(Position::new(20), Err(WeatherError::InvalidPosition(20)));
        assert_eq!(Position::new(19).unwrap().get(), 19);
    }

    #[test]
    fn duplicate_cell_rejected() {
        let err = HexGrid::from_layout(&[(1, (0, 0)), (1, (0, 1))]).unwrap_err();
        assert_eq!(err, TopologyError::DuplicateCell(1));
    }

    #[test]
    fn duplicate_coordinate_rejected() {
        let err = HexGrid::from_layout(&[(1, (0, 0)), (2, (0, 0))]).unwrap_err();
        assert_eq!(err, TopologyError::DuplicateCoordinate(1, 2));
    }

    #[test]
    fn incomplete_layout_rejected() {
        let err = HexGrid::from_layout(&[(1, (0, 0))]).unwrap_err();
        assert_eq!(err, TopologyError::MissingCell(2));
    }

    #[test]
    fn direction_codes_match_edge_order() {
        assert_eq!(Direction::Stay.code(), 0);
        for (i, d) in Direction::EDGES.iter().enumerate() {
            assert_eq!(d.code() as usize, i + 1);
        }
    }

    #[test]
    fn position_deserializes_from_integer() {
        let pos: Position = serde_json::from_str("7").unwrap();
        assert_eq!(pos.get(), 7);
        assert!(serde_json::from_str::<Position>("0").is_err());
    }
}
