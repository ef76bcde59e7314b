//! Engine errors

use pacebench_ipc::FrameError;
use thiserror::Error;

/// Errors raised while declaring or running tests.
///
/// Failures of user code (hooks, describe and test bodies, measured
/// callbacks) carry the user's message verbatim so reporters can show it
/// as-is.
#[derive(Debug, Error)]
pub enum Error {
    /// User code returned an error
    #[error("{0}")]
    Failed(String),

    /// User code panicked
    #[error("{0}")]
    Panicked(String),

    /// A test body ran measurements after an earlier hook failure
    #[error("test aborted after a failed hook")]
    Aborted,

    /// The test node has no body in this tree (built without bodies)
    #[error("test `{0}` has no body in this tree")]
    MissingBody(String),

    /// No suite registered under that name
    #[error("unknown suite `{0}`")]
    UnknownSuite(String),

    /// No setup registered under that name
    #[error("unknown setup `{0}`")]
    UnknownSetup(String),

    /// An option value cannot be used as given
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// The location does not address a test in the rebuilt tree
    #[error("no test at location {0:?}")]
    InvalidLocation(Vec<u32>),

    /// Transport failure
    #[error("IPC error: {0}")]
    Ipc(#[from] FrameError),

    /// OS-level failure (async runtime construction and similar)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
