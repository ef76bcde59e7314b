//! Running Histogram
//!
//! Streaming population statistics over a sequence of samples. Only the
//! count and two compensated sums are stored; every other figure is derived
//! on demand. Every derived figure is `0.0` for an empty histogram.

use crate::adder::Adder;
use crate::stats::Stats;

/// Two-tailed Student's t critical values at 95% confidence, indexed by
/// `min(size, len) - 1`.
#[rustfmt::skip]
pub const T_TABLE: [f64; 120] = [
    12.710, 4.3030, 3.1820, 2.7760, 2.5710, 2.4470, 2.3650, 2.3060,
    2.2620, 2.2280, 2.2010, 2.1790, 2.1600, 2.1450, 2.1310, 2.1200,
    2.1100, 2.1010, 2.0930, 2.0860, 2.0800, 2.0740, 2.0690, 2.0640,
    2.0600, 2.0560, 2.0520, 2.0480, 2.0450, 2.0420, 2.0399, 2.0378,
    2.0357, 2.0336, 2.0315, 2.0294, 2.0273, 2.0252, 2.0231, 2.0210,
    2.0198, 2.0186, 2.0174, 2.0162, 2.0150, 2.0138, 2.0126, 2.0114,
    2.0102, 2.0090, 2.0081, 2.0072, 2.0063, 2.0054, 2.0045, 2.0036,
    2.0027, 2.0018, 2.0009, 2.0000, 1.9995, 1.9990, 1.9985, 1.9980,
    1.9975, 1.9970, 1.9965, 1.9960, 1.9955, 1.9950, 1.9945, 1.9940,
    1.9935, 1.9930, 1.9925, 1.9920, 1.9915, 1.9910, 1.9905, 1.9900,
    1.9897, 1.9894, 1.9891, 1.9888, 1.9885, 1.9882, 1.9879, 1.9876,
    1.9873, 1.9870, 1.9867, 1.9864, 1.9861, 1.9858, 1.9855, 1.9852,
    1.9849, 1.9846, 1.9843, 1.9840, 1.9838, 1.9836, 1.9834, 1.9832,
    1.9830, 1.9828, 1.9826, 1.9824, 1.9822, 1.9820, 1.9818, 1.9816,
    1.9814, 1.9812, 1.9810, 1.9808, 1.9806, 1.9804, 1.9802, 1.9800,
];

/// Critical value for a population of `size` samples.
///
/// Returns `0.0` for an empty population.
pub fn critical_value(size: u64) -> f64 {
    if size == 0 {
        return 0.0;
    }
    let index = (size.min(T_TABLE.len() as u64) - 1) as usize;
    T_TABLE[index]
}

/// Mutable population statistics.
///
/// Durations are expected in milliseconds, which is what makes
/// [`hz`](Histogram::hz) an operations-per-second figure.
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    size: u64,
    sum: Adder,
    sum_sq: Adder,
}

impl Histogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample
    #[inline]
    pub fn add(&mut self, value: f64) {
        self.sum.add(value);
        self.sum_sq.add(value * value);
        self.size += 1;
    }

    /// Merge the accumulated population of another histogram.
    ///
    /// The result describes the union of both sample sets, so merging the
    /// histograms of `A` and `B` yields the same mean and variance as one
    /// histogram fed `A` followed by `B`.
    pub fn add_population(&mut self, other: &Histogram) {
        self.sum.add(other.sum.sum());
        self.sum_sq.add(other.sum_sq.sum());
        self.size += other.size;
    }

    /// Number of recorded samples
    pub fn size(&self) -> u64 {
        self.size
    }

    /// `true` when no samples were recorded
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Arithmetic mean
    pub fn mean(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        self.sum.sum() / self.size as f64
    }

    /// Population variance (biased estimator)
    pub fn variance(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        let n = self.size as f64;
        let sum = self.sum.sum();

        // Cancellation can leave a tiny negative residue for constant samples
        ((self.sum_sq.sum() - sum * sum / n) / n).max(0.0)
    }

    /// Standard deviation
    pub fn sd(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the mean
    pub fn sem(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        self.sd() / (self.size as f64).sqrt()
    }

    /// Margin of error at 95% confidence
    pub fn moe(&self) -> f64 {
        self.sem() * critical_value(self.size)
    }

    /// Relative margin of error, as a fraction of the mean
    pub fn rme(&self) -> f64 {
        let mean = self.mean();
        if mean == 0.0 {
            return 0.0;
        }
        self.moe() / mean
    }

    /// Operations per second, assuming millisecond samples
    pub fn hz(&self) -> f64 {
        let mean = self.mean();
        if mean == 0.0 {
            return 0.0;
        }
        1000.0 / mean
    }

    /// Snapshot of all derived figures
    pub fn stats(&self) -> Stats {
        Stats {
            size: self.size,
            mean: self.mean(),
            variance: self.variance(),
            sd: self.sd(),
            sem: self.sem(),
            moe: self.moe(),
            rme: self.rme(),
            hz: self.hz(),
        }
    }
}
