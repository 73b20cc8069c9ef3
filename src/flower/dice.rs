use rand::Rng;
use serde::Serialize;

use crate::error::WeatherError;
use crate::flower::grid::Direction;

pub const MIN_ROLL: u8 = 2;
pub const MAX_ROLL: u8 = 14;

/// Upper bound (inclusive) of each dice band and the direction it maps to.
const BANDS: [(u8, Direction); 7] = [
    (3, Direction::UpperRight),
    (5, Direction::LowerRight),
    (7, Direction::Down),
    (8, Direction::Stay),
    (10, Direction::LowerLeft),
    (12, Direction::UpperLeft),
    (14, Direction::Up),
];

/// A source of uniform die faces.
pub trait DiceSource {
    /// A uniform value in `1..=sides`.
    fn roll(&mut self, sides: u8) -> u8;
}

/// Dice backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngDice<R> {
    rng: R,
}

impl<R: Rng> RngDice<R> {
    pub fn new(rng: R) -> Self {
        RngDice { rng }
    }
}

impl<R: Rng> DiceSource for RngDice<R> {
    fn roll(&mut self, sides: u8) -> u8 {
        self.rng.gen_range(1..=sides)
    }
}

/// One throw of a d6 and a d8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiceRoll {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d6: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d8: Option<u8>,
    pub total: u8,
}

impl DiceRoll {
    pub fn throw(dice: &mut impl DiceSource) -> Self {
        let d6 = dice.roll(6);
        let d8 = dice.roll(8);
        DiceRoll {
            d6: Some(d6),
            d8: Some(d8),
            total: d6 + d8,
        }
    }

    /// A roll known only by its total, e.g. one supplied by a client.
    pub fn from_total(total: i64) -> Result<Self, WeatherError> {
        if (MIN_ROLL as i64..=MAX_ROLL as i64).contains(&total) {
            Ok(DiceRoll {
                d6: None,
                d8: None,
                total: total as u8,
            })
        } else {
            Err(WeatherError::InvalidRoll(total))
        }
    }
}

/// Fixed mapping from a d6+d8 total to a direction, shared by every climate.
pub struct TransitionTable;

impl TransitionTable {
    pub fn resolve(total: i64) -> Result<Direction, WeatherError> {
        if !(MIN_ROLL as i64..=MAX_ROLL as i64).contains(&total) {
            return Err(WeatherError::InvalidRoll(total));
        }
        BANDS
            .iter()
            .find(|(upper, _)| total <= *upper as i64)
            .map(|&(_, direction)| direction)
            .ok_or(WeatherError::InvalidRoll(total))
    }

    /// Rolls that map to `direction`.
    pub fn totals(direction: Direction) -> impl Iterator<Item = u8> {
        (MIN_ROLL..=MAX_ROLL).filter(move |&t| Self::resolve(t as i64) == Ok(direction))
    }

    /// Exact chance of `direction` over the 48 equally likely (d6, d8) pairs.
    pub fn probability(direction: Direction) -> f64 {
        let hits = (1..=6u8)
            .flat_map(|a| (1..=8u8).map(move |b| a + b))
            .filter(|&t| Self::resolve(t as i64) == Ok(direction))
            .count();
        hits as f64 / 48.0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::VecDeque;

    /// Replays fixed faces, then panics when exhausted.
    pub(crate) struct ScriptedDice(pub VecDeque<u8>);

    impl ScriptedDice {
        pub(crate) fn new(faces: &[u8]) -> Self {
            ScriptedDice(faces.iter().copied().collect())
        }
    }

    impl DiceSource for ScriptedDice {
        fn roll(&mut self, sides: u8) -> u8 {
            let face = self.0.pop_front().expect("script exhausted");
            assert!(face >= 1 && face <= sides, "face {} not on a d{}", face, sides);
            face
        }
    }

    #[test]
    fn resolve_matches_bands() {
        use Direction::*;
        let expected = [
            UpperRight, UpperRight, LowerRight, LowerRight, Down, Down, Stay, LowerLeft,
            LowerLeft, UpperLeft, UpperLeft, Up, Up,
        ];
        for (total, dir) in (2..=14).zip(expected) {
            assert_eq!(TransitionTable::resolve(total), Ok(dir), "total {}", total);
        }
    }

    #[test]
    fn resolve_rejects_out_of_range() {
        assert_eq!(TransitionTable::resolve(1), Err(WeatherError::InvalidRoll(1)));
        assert_eq!(TransitionTable::resolve(15), Err(WeatherError::InvalidRoll(15)));
        assert_eq!(TransitionTable::resolve(-3), Err(WeatherError::InvalidRoll(-3)));
    }

    #[test]
    fn probabilities_sum_to_one() {
        let mut all = Direction::EDGES.to_vec();
        all.push(Direction::Stay);
        let total: f64 = all.iter().map(|&d| TransitionTable::probability(d)).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn probabilities_are_asymmetric_bands() {
        let p = TransitionTable::probability;
        assert!((p(Direction::UpperRight) - 3.0 / 48.0).abs() < 1e-9);
        assert!((p(Direction::LowerRight) - 7.0 / 48.0).abs() < 1e-9);
        assert!((p(Direction::Down) - 11.0 / 48.0).abs() < 1e-9);
        assert!((p(Direction::Stay) - 6.0 / 48.0).abs() < 1e-9);
        assert!((p(Direction::LowerLeft) - 11.0 / 48.0).abs() < 1e-9);
        assert!((p(Direction::UpperLeft) - 7.0 / 48.0).abs() < 1e-9);
        assert!((p(Direction::Up) - 3.0 / 48.0).abs() < 1e-9);
    }

    #[test]
    fn totals_lists_band_members() {
        let stay: Vec<u8> = TransitionTable::totals(Direction::Stay).collect();
        assert_eq!(stay, vec![8]);
        let up: Vec<u8> = TransitionTable::totals(Direction::Up).collect();
        assert_eq!(up, vec![13, 14]);
    }

    #[test]
    fn throw_sums_both_dice() {
        let mut dice = ScriptedDice::new(&[2, 7]);
        let roll = DiceRoll::throw(&mut dice);
        assert_eq!(roll.d6, Some(2));
        assert_eq!(roll.d8, Some(7));
        assert_eq!(roll.total, 9);
    }

    #[test]
    fn rng_dice_stay_in_range() {
        let mut dice = RngDice::new(ChaCha8Rng::seed_from_u64(7));
        for _ in 0..1000 {
            let d6 = dice.roll(6);
            let d8 = dice.roll(8);
            assert!((1..=6).contains(&d6));
            assert!((1..=8).contains(&d8));
        }
    }

    #[test]
    fn from_total_validates() {
        assert_eq!(DiceRoll::from_total(8).unwrap().total, 8);
        assert_eq!(DiceRoll::from_total(1), Err(WeatherError::InvalidRoll(1)));
    }
}
