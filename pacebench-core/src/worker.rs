//! Worker Process Entry Point
//!
//! A worker runs exactly one test per process lifetime:
//!
//! ```text
//! worker                         master
//!   Hello(capabilities)   ---->
//!                         <----  Init { suite, setups, location, options }
//!   Event(TestStart)      ---->
//!   Event(...)            ---->
//!   Event(TestEnd)        ---->
//!   exit
//! ```
//!
//! On Unix the channel is the descriptor pair named in `PACE_IPC_FD`;
//! otherwise stdin/stdout.

use crate::allocator::{HeapProbe, is_tracking};
use crate::error::Error;
use crate::registry::SuitePlan;
use crate::timing::pin_to_cpu;
use crate::tree::Runtime;
use crate::walker::resume;
use pacebench_ipc::{
    EventSink, FrameError, FrameReader, FrameWriter, IPC_FD_ENV, LifecycleEvent, MasterMessage,
    TestInit, WorkerCapabilities, WorkerMessage,
};
use std::io::{Read, Write};
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// IPC transport: either inherited fd pair or stdin/stdout fallback.
enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(value) = std::env::var(IPC_FD_ENV) {
        if let Some((r, w)) = value.split_once(',') {
            if let (Ok(read_fd), Ok(write_fd)) = (r.trim().parse(), w.trim().parse()) {
                return IpcTransport::Fds { read_fd, write_fd };
            }
        }
        warn!("invalid {IPC_FD_ENV}={value:?} (expected <read_fd>,<write_fd>), falling back to stdio");
    }
    IpcTransport::Stdio
}

/// Forwards lifecycle events to the master, remembering the first
/// transport failure
struct ChannelSink<'w, W: Write> {
    writer: &'w mut FrameWriter<W>,
    failure: Option<FrameError>,
}

impl<W: Write> EventSink for ChannelSink<'_, W> {
    fn emit(&mut self, event: LifecycleEvent) {
        if self.failure.is_some() {
            return;
        }
        if let Err(error) = self.writer.send(&WorkerMessage::Event(event)) {
            warn!(%error, "master channel closed, dropping remaining events");
            self.failure = Some(error);
        }
    }
}

/// Worker side of the master/worker protocol
pub struct WorkerMain<R: Read = Box<dyn Read>, W: Write = Box<dyn Write>> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl WorkerMain {
    /// Connect using the inherited descriptors, or stdin/stdout
    pub fn new() -> Self {
        match detect_transport() {
            #[cfg(unix)]
            IpcTransport::Fds { read_fd, write_fd } => {
                // SAFETY: the master hands these descriptors to this process
                // exclusively and they stay open until exit
                let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                Self::with_channel(
                    Box::new(read_file) as Box<dyn Read>,
                    Box::new(write_file) as Box<dyn Write>,
                )
            }
            IpcTransport::Stdio => Self::with_channel(
                Box::new(std::io::stdin()) as Box<dyn Read>,
                Box::new(std::io::stdout()) as Box<dyn Write>,
            ),
        }
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read, W: Write> WorkerMain<R, W> {
    /// Worker over an explicit channel
    pub fn with_channel(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Handshake, receive one `Init`, run that test, return.
    pub fn run(&mut self) -> Result<(), Error> {
        self.writer
            .send(&WorkerMessage::Hello(WorkerCapabilities::detect(is_tracking())))?;

        // Keep the measured thread on one core
        if let Err(error) = pin_to_cpu(0) {
            debug!(%error, "could not pin worker to cpu 0");
        }

        match self.reader.recv::<MasterMessage>()? {
            MasterMessage::Shutdown => {
                debug!("shutdown requested before init");
                Ok(())
            }
            MasterMessage::Init(init) => self.run_test(init),
        }
    }

    fn run_test(&mut self, init: TestInit) -> Result<(), Error> {
        debug!(suite = %init.suite, location = ?init.location, "worker running test");

        let mut sink = ChannelSink {
            writer: &mut self.writer,
            failure: None,
        };

        let outcome = SuitePlan::resolve(&init.suite, &init.setups).and_then(|plan| {
            resume(
                plan.name(),
                |rt: &mut Runtime| plan.declare(rt),
                &init.location,
                &init.options,
                &HeapProbe,
                &mut sink,
            )
        });
        if let Err(error) = outcome {
            sink.emit(LifecycleEvent::FatalError {
                message: error.to_string(),
            });
        }

        match sink.failure {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}
