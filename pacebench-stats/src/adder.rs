//! Compensated Summation
//!
//! Kahan-Babuska (Neumaier) summation: the running compensation term picks up
//! the low-order bits that a plain `+=` would lose, whichever operand is
//! larger in magnitude.

/// Floating-point accumulator with bounded rounding error.
///
/// The reported total is `sum + compensation`, which stays within one
/// rounding of the exact total regardless of the order or magnitude of the
/// added values.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Adder {
    sum: f64,
    compensation: f64,
}

impl Adder {
    /// Create an empty accumulator
    pub const fn new() -> Self {
        Self {
            sum: 0.0,
            compensation: 0.0,
        }
    }

    /// Accumulate one value
    #[inline]
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;

        self.compensation += if self.sum.abs() < value.abs() {
            value - t + self.sum
        } else {
            self.sum - t + value
        };
        self.sum = t;
    }

    /// Compensated total of everything added so far
    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl Extend<f64> for Adder {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<f64> for Adder {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut adder = Adder::new();
        adder.extend(iter);
        adder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(Adder::new().sum(), 0.0);
    }

    #[test]
    fn test_tenths_sum_to_one() {
        let mut adder = Adder::new();
        for _ in 0..10 {
            adder.add(0.1);
        }
        assert_eq!(adder.sum(), 1.0);

        // Naive summation drifts
        let naive: f64 = std::iter::repeat_n(0.1, 10).sum();
        assert_ne!(naive, 1.0);
    }

    #[test]
    fn test_large_and_small_magnitudes() {
        // 1.0 is below the ulp of 1e100, a naive sum returns 0.0
        let adder: Adder = [1e100, 1.0, -1e100].into_iter().collect();
        assert_eq!(adder.sum(), 1.0);
    }

    #[test]
    fn test_negative_values() {
        let adder: Adder = [-0.1; 10].into_iter().collect();
        assert_eq!(adder.sum(), -1.0);
    }

    proptest! {
        #[test]
        fn prop_order_independent(values in prop::collection::vec(-1e6f64..1e6, 1..200)) {
            let forward: Adder = values.iter().copied().collect();
            let backward: Adder = values.iter().rev().copied().collect();

            let naive_error_bound = values.iter().map(|v| v.abs()).sum::<f64>()
                * values.len() as f64
                * f64::EPSILON;

            prop_assert!((forward.sum() - backward.sum()).abs() <= naive_error_bound);
        }

        #[test]
        fn prop_integers_are_exact(values in prop::collection::vec(-1_000_000i32..1_000_000, 0..500)) {
            let adder: Adder = values.iter().map(|&v| v as f64).collect();
            let exact: i64 = values.iter().map(|&v| v as i64).sum();
            prop_assert_eq!(adder.sum(), exact as f64);
        }
    }
}
