pub mod dice;
pub mod grid;
pub mod overrides;

pub use dice::{DiceRoll, DiceSource, RngDice, TransitionTable};
pub use grid::{Direction, HexGrid, Position, CELL_COUNT};
pub use overrides::{step, ExceptionOverrides, FlowerRules};
