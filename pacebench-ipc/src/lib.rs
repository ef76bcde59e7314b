#![warn(missing_docs)]
//! Pacebench IPC Protocol
//!
//! Master/worker protocol for running one test per process:
//! - [`MasterMessage::Init`] tells a fresh worker which suite to rebuild and
//!   which test location to run
//! - [`WorkerMessage::Event`] streams the worker's lifecycle events back, in
//!   emission order
//!
//! Messages are rkyv-encoded inside length-prefixed frames.

mod events;
mod framing;
mod messages;
mod options;

pub use events::{EventSink, LifecycleEvent};
pub use framing::{FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, decode, encode};
pub use messages::{MasterMessage, TestInit, WorkerCapabilities, WorkerMessage};
pub use options::TestOptions;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the worker's `read,write` descriptors
pub const IPC_FD_ENV: &str = "PACE_IPC_FD";
