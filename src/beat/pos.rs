use std::cmp::Ordering;
use std::ops::{Add, Sub};

/// Exact mixed-number position within a chart: `measure + split / measure_split`.
///
/// Always kept normalized: `measure_split > 0` and `0 <= split < measure_split`.
/// Value type; every operation returns a fresh position.
#[derive(Debug, Clone, Copy)]
pub struct BeatPos {
    pub measure: i64,
    pub measure_split: i64,
    pub split: i64,
}

impl BeatPos {
    pub const ZERO: BeatPos = BeatPos {
        measure: 0,
        measure_split: 1,
        split: 0,
    };

    /// Create a normalized position. A non-positive denominator is treated as 1.
    pub fn new(measure: i64, measure_split: i64, split: i64) -> Self {
        Self::normalized(measure, measure_split.max(1), split)
    }

    /// Carry/borrow `split` into `measure` so that `0 <= split < measure_split`.
    fn normalized(measure: i64, measure_split: i64, split: i64) -> Self {
        Self {
            measure: measure + split.div_euclid(measure_split),
            measure_split,
            split: split.rem_euclid(measure_split),
        }
    }

    /// Position as a real number of measures.
    pub fn as_measures(&self) -> f64 {
        self.measure as f64 + self.split as f64 / self.measure_split as f64
    }
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn lcm(a: i64, b: i64) -> i64 {
    a / gcd(a, b) * b
}

impl Add for BeatPos {
    type Output = BeatPos;

    fn add(self, rhs: BeatPos) -> BeatPos {
        let m = lcm(self.measure_split, rhs.measure_split);
        let split = self.split * (m / self.measure_split) + rhs.split * (m / rhs.measure_split);
        BeatPos::normalized(self.measure + rhs.measure, m, split)
    }
}

impl Sub for BeatPos {
    type Output = BeatPos;

    fn sub(self, rhs: BeatPos) -> BeatPos {
        let m = lcm(self.measure_split, rhs.measure_split);
        let split = self.split * (m / self.measure_split) - rhs.split * (m / rhs.measure_split);
        BeatPos::normalized(self.measure - rhs.measure, m, split)
    }
}

impl PartialEq for BeatPos {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BeatPos {}

impl PartialOrd for BeatPos {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BeatPos {
    /// Lexicographic on `(measure, split / measure_split)`. The fractional parts
    /// are compared by exact cross-multiplication rather than floating division.
    fn cmp(&self, other: &Self) -> Ordering {
        self.measure.cmp(&other.measure).then_with(|| {
            let lhs = self.split as i128 * other.measure_split as i128;
            let rhs = other.split as i128 * self.measure_split as i128;
            lhs.cmp(&rhs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rescales_to_common_denominator() {
        // 1/2 + 1/3 = 5/6
        let a = BeatPos::new(0, 2, 1);
        let b = BeatPos::new(0, 3, 1);
        let sum = a + b;
        assert_eq!(sum.measure, 0);
        assert_eq!(sum.measure_split, 6);
        assert_eq!(sum.split, 5);
    }

    #[test]
    fn add_carries_into_measure() {
        // 3/4 + 1/2 = 1 + 1/4
        let sum = BeatPos::new(0, 4, 3) + BeatPos::new(0, 2, 1);
        assert_eq!(sum.measure, 1);
        assert_eq!(sum.split, 1);
        assert_eq!(sum.measure_split, 4);
    }

    #[test]
    fn sub_borrows_from_measure() {
        // 2 + 1/4 - 1/2 = 1 + 3/4
        let diff = BeatPos::new(2, 4, 1) - BeatPos::new(0, 2, 1);
        assert_eq!(diff.measure, 1);
        assert_eq!(diff.split, 3);
        assert_eq!(diff.measure_split, 4);
    }

    #[test]
    fn constructor_normalizes_overflow() {
        let p = BeatPos::new(1, 4, 9);
        assert_eq!(p.measure, 3);
        assert_eq!(p.split, 1);
    }

    #[test]
    fn equality_across_denominators() {
        assert_eq!(BeatPos::new(2, 2, 1), BeatPos::new(2, 4, 2));
        assert_ne!(BeatPos::new(2, 2, 1), BeatPos::new(2, 4, 1));
    }

    #[test]
    fn ordering_matches_real_position() {
        let mut positions = vec![
            BeatPos::new(1, 2, 1),
            BeatPos::new(0, 3, 2),
            BeatPos::new(1, 4, 1),
            BeatPos::new(0, 1, 0),
        ];
        positions.sort();
        let reals: Vec<f64> = positions.iter().map(|p| p.as_measures()).collect();
        for pair in reals.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn add_then_sub_is_identity() {
        let a = BeatPos::new(3, 8, 5);
        let b = BeatPos::new(1, 6, 4);
        assert_eq!((a + b) - b, a);
    }
}
