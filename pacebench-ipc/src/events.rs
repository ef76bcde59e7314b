//! Lifecycle Events
//!
//! The ordered stream produced while walking a suite. The same stream is
//! consumed in-process by reporters and forwarded verbatim from worker
//! processes to the master.

use pacebench_stats::Stats;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

/// One step of a suite run.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A suite is about to be walked
    SuiteStart {
        /// Suite name
        name: String,
    },
    /// All tests of a suite were visited
    SuiteEnd {
        /// Suite name
        name: String,
    },
    /// Entering a describe block with at least one enabled test
    DescribeStart {
        /// Describe name
        name: String,
    },
    /// Leaving a describe block
    DescribeEnd {
        /// Describe name
        name: String,
    },
    /// A test starts running
    TestStart {
        /// Test name
        name: String,
        /// Child indices from the suite root
        location: Vec<u32>,
    },
    /// A test finished, successfully or not
    TestEnd {
        /// Test name
        name: String,
        /// Merged duration statistics of every measurement (ms)
        duration: Stats,
        /// Merged memory statistics of every measurement (bytes)
        memory: Stats,
    },
    /// Warmup iterations begin
    MeasureWarmupStart,
    /// Warmup iterations finished
    MeasureWarmupEnd,
    /// Measured iterations begin
    MeasureStart,
    /// Measurement progress in `[0, 1]`, non-decreasing within a measurement
    MeasureProgress {
        /// Fraction complete
        percent: f64,
    },
    /// The measured callback failed during an iteration
    MeasureError {
        /// Failure description
        message: String,
    },
    /// Measurement finished
    MeasureEnd {
        /// Duration statistics (ms)
        duration: Stats,
        /// Memory statistics (bytes)
        memory: Stats,
    },
    /// A describe body, hook or test body failed
    Error {
        /// Failure description
        message: String,
    },
    /// A suite could not be declared or a worker could not run its test
    FatalError {
        /// Failure description
        message: String,
    },
}

impl LifecycleEvent {
    /// `true` for events that carry an error message
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::MeasureError { .. }
                | LifecycleEvent::Error { .. }
                | LifecycleEvent::FatalError { .. }
        )
    }
}

/// Consumer of lifecycle events.
pub trait EventSink {
    /// Receive the next event
    fn emit(&mut self, event: LifecycleEvent);
}

impl EventSink for Vec<LifecycleEvent> {
    fn emit(&mut self, event: LifecycleEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: LifecycleEvent) {
        (**self).emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_preserves_order() {
        let mut events = Vec::new();
        {
            let sink: &mut dyn EventSink = &mut events;
            sink.emit(LifecycleEvent::MeasureStart);
            sink.emit(LifecycleEvent::MeasureProgress { percent: 0.5 });
        }
        assert_eq!(
            events,
            vec![
                LifecycleEvent::MeasureStart,
                LifecycleEvent::MeasureProgress { percent: 0.5 }
            ]
        );
    }

    #[test]
    fn test_is_error() {
        assert!(LifecycleEvent::FatalError { message: "x".into() }.is_error());
        assert!(!LifecycleEvent::MeasureStart.is_error());
    }
}
