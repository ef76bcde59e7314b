//! Statistics Payload

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

/// Derived figures of a [`Histogram`](crate::Histogram) at one point in time.
///
/// This is what crosses the process boundary and what lands in reports.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
    Archive,
    RkyvSerialize,
    RkyvDeserialize,
)]
#[archive(check_bytes)]
pub struct Stats {
    /// Number of samples
    pub size: u64,
    /// Mean
    pub mean: f64,
    /// Population variance
    pub variance: f64,
    /// Standard deviation
    pub sd: f64,
    /// Standard error of the mean
    pub sem: f64,
    /// Margin of error (95%)
    pub moe: f64,
    /// Relative margin of error
    pub rme: f64,
    /// Operations per second
    pub hz: f64,
}

impl Stats {
    /// `true` when no samples back these figures
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}
