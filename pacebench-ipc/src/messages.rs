//! IPC Message Types
//!
//! One closed enum per direction. All messages are serialized with rkyv and
//! validated on receipt.

use crate::events::LifecycleEvent;
use crate::options::TestOptions;
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

/// Worker capabilities advertised during handshake
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerCapabilities {
    /// Protocol version for compatibility
    pub protocol_version: u32,
    /// Worker process id
    pub pid: u32,
    /// Whether the tracking allocator is installed in the worker binary
    pub has_alloc_tracking: bool,
    /// Number of logical CPUs available
    pub cpu_count: u32,
    /// CPU model string (for reports)
    pub cpu_model: String,
}

impl WorkerCapabilities {
    /// Capabilities of the current process
    pub fn detect(has_alloc_tracking: bool) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            pid: std::process::id(),
            has_alloc_tracking,
            cpu_count: num_cpus(),
            cpu_model: cpu_model_string(),
        }
    }
}

/// Everything a fresh worker needs to rebuild its suite and run one test
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct TestInit {
    /// Registered name of the suite to declare
    pub suite: String,
    /// Registered setups to declare before the suite, in order
    pub setups: Vec<String>,
    /// Child indices of the test to run
    pub location: Vec<u32>,
    /// Run-wide options (config file and CLI), below any scope options
    pub options: TestOptions,
}

/// Messages sent from Worker to Master
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// Initial handshake with worker capabilities
    Hello(WorkerCapabilities),
    /// Lifecycle event emitted while running the test
    Event(LifecycleEvent),
}

/// Messages sent from Master to Worker
#[derive(Debug, Clone, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum MasterMessage {
    /// Run one test and exit
    Init(TestInit),
    /// Exit without running anything
    Shutdown,
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|p| p.get() as u32)
        .unwrap_or(1)
}

fn cpu_model_string() -> String {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|line| line.starts_with("model name"))
                    .and_then(|line| line.split(':').nth(1))
                    .map(|s| s.trim().to_string())
            })
            .unwrap_or_else(|| "Unknown CPU".to_string())
    }

    #[cfg(not(target_os = "linux"))]
    {
        "Unknown CPU".to_string()
    }
}
