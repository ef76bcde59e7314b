#![warn(missing_docs)]
//! Pacebench Statistics
//!
//! Numerically stable running statistics that drive the adaptive sampler:
//! - Kahan-Babuska compensated summation ([`Adder`])
//! - Streaming mean/variance/standard error ([`Histogram`])
//! - Margin of error from a Student's t critical value table

mod adder;
mod histogram;
mod stats;

pub use adder::Adder;
pub use histogram::{Histogram, T_TABLE, critical_value};
pub use stats::Stats;

/// Two-tailed normal critical value the t-table converges towards
pub const NORMAL_CRITICAL_VALUE: f64 = 1.96;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_converges_towards_normal() {
        let last = T_TABLE[T_TABLE.len() - 1];
        assert!(last > NORMAL_CRITICAL_VALUE);
        assert!(last - NORMAL_CRITICAL_VALUE < 0.05);
        assert!(T_TABLE.len() >= 30);
    }
}
