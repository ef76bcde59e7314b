//! Supervisor Process
//!
//! Spawns one worker process per test and relays its lifecycle events.

use pacebench_core::{BuildMode, NodeId, TestExecutor, Tree};
use pacebench_ipc::{
    EventSink, FrameError, FrameReader, FrameWriter, IPC_FD_ENV, LifecycleEvent, MasterMessage,
    TestInit, TestOptions, WorkerCapabilities, WorkerMessage,
};
use std::env;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Hidden flag that turns the benchmark binary into a worker
pub const WORKER_FLAG: &str = "--pace-worker";

/// Failures while driving a worker process
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The worker process could not be started
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// Framing or transport failure
    #[error("IPC error: {0}")]
    IpcError(String),

    /// The worker exited before finishing its test
    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    /// The worker outlived its timeout
    #[error("Worker timed out after {0:?}")]
    Timeout(Duration),

    /// The worker sent an unexpected message
    #[error("Worker protocol error: expected {expected}, got {got}")]
    ProtocolError {
        /// What the supervisor waited for
        expected: String,
        /// What arrived instead
        got: String,
    },
}

impl From<FrameError> for SupervisorError {
    fn from(e: FrameError) -> Self {
        SupervisorError::IpcError(e.to_string())
    }
}

/// Result of polling for data
#[derive(Debug)]
enum PollResult {
    DataAvailable,
    Timeout,
    PipeClosed,
    Error(std::io::Error),
}

/// Wait for data to be available on a file descriptor with timeout
fn wait_for_data(fd: RawFd, timeout_ms: i32) -> PollResult {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };

    let result = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };

    if result < 0 {
        PollResult::Error(std::io::Error::last_os_error())
    } else if result == 0 {
        PollResult::Timeout
    } else if pollfd.revents & libc::POLLIN != 0 {
        // Even a closing pipe may still hold data
        PollResult::DataAvailable
    } else if pollfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        PollResult::PipeClosed
    } else {
        PollResult::Timeout
    }
}

/// Create a pipe pair with close-on-exec set, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Send SIGTERM to a process. Returns `Err` if the signal could not be delivered.
fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Tracks what a worker reported so crashes can be completed for reporters
struct RelaySink<'s> {
    inner: &'s mut dyn EventSink,
    started: bool,
    ended: bool,
    fatal: bool,
}

impl EventSink for RelaySink<'_> {
    fn emit(&mut self, event: LifecycleEvent) {
        match &event {
            LifecycleEvent::TestStart { .. } => self.started = true,
            LifecycleEvent::TestEnd { .. } => self.ended = true,
            LifecycleEvent::FatalError { .. } => self.fatal = true,
            _ => {}
        }
        self.inner.emit(event);
    }
}

/// Worker process handle
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: FrameWriter<std::fs::File>,
    capabilities: Option<WorkerCapabilities>,
    timeout: Duration,
    deadline: Instant,
    msg_read_fd: RawFd,
}

impl WorkerHandle {
    /// Spawn a worker from the current executable using fd 3/4 for IPC.
    ///
    /// `timeout` bounds the worker's whole lifetime, handshake included.
    pub fn spawn(timeout: Duration) -> Result<Self, SupervisorError> {
        let binary = env::current_exe().map_err(SupervisorError::SpawnFailed)?;
        Self::spawn_binary(&binary, timeout)
    }

    /// Spawn a worker from a specific binary
    pub fn spawn_binary(binary: &Path, timeout: Duration) -> Result<Self, SupervisorError> {
        // cmd_pipe: supervisor writes commands, worker reads from fd 3
        let (cmd_read, cmd_write) = create_pipe()?;
        // msg_pipe: worker writes messages to fd 4, supervisor reads
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        let mut command = Command::new(binary);
        command
            .arg(WORKER_FLAG)
            .env(IPC_FD_ENV, "3,4")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        // Either parent pipe may already sit on fd 3 or 4: lift both child
        // ends above 10 before placing them. Parent ends are close-on-exec.
        unsafe {
            command.pre_exec(move || {
                let high_read = libc::fcntl(cmd_read, libc::F_DUPFD_CLOEXEC, 10);
                if high_read < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                let high_write = libc::fcntl(msg_write, libc::F_DUPFD_CLOEXEC, 10);
                if high_write < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                // dup2 clears close-on-exec on the target
                if libc::dup2(high_read, 3) < 0 || libc::dup2(high_write, 4) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                libc::close(high_read);
                libc::close(high_write);
                Ok(())
            });
        }

        let child = match command.spawn() {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                close_fd(msg_read);
                close_fd(msg_write);
                return Err(SupervisorError::SpawnFailed(e));
            }
        };

        // Close the child-side ends in the parent
        close_fd(cmd_read);
        close_fd(msg_write);

        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };

        let mut handle = Self {
            child,
            reader: FrameReader::new(reader_file),
            writer: FrameWriter::new(writer_file),
            capabilities: None,
            timeout,
            deadline: Instant::now() + timeout,
            msg_read_fd: msg_read,
        };

        handle.wait_for_hello()?;
        Ok(handle)
    }

    /// Wait for Hello message from worker and validate protocol version
    fn wait_for_hello(&mut self) -> Result<(), SupervisorError> {
        match self.next_message()? {
            Some(WorkerMessage::Hello(caps)) => {
                if caps.protocol_version != pacebench_ipc::PROTOCOL_VERSION {
                    return Err(SupervisorError::ProtocolError {
                        expected: format!("protocol version {}", pacebench_ipc::PROTOCOL_VERSION),
                        got: format!("protocol version {}", caps.protocol_version),
                    });
                }
                debug!(pid = caps.pid, alloc_tracking = caps.has_alloc_tracking, "worker ready");
                self.capabilities = Some(caps);
                Ok(())
            }
            Some(other) => Err(SupervisorError::ProtocolError {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
            None => Err(SupervisorError::WorkerCrashed(self.exit_description())),
        }
    }

    /// Get worker capabilities
    pub fn capabilities(&self) -> Option<&WorkerCapabilities> {
        self.capabilities.as_ref()
    }

    /// Run one test on this worker, relaying its events to `sink` in order.
    ///
    /// Returns once the worker closes its channel. A channel closed before
    /// `TestEnd` (and without a fatal error) is a crash.
    pub fn run_test(
        &mut self,
        init: TestInit,
        sink: &mut dyn EventSink,
    ) -> Result<(), SupervisorError> {
        self.writer.send(&MasterMessage::Init(init))?;

        let mut relay = RelaySink {
            inner: sink,
            started: false,
            ended: false,
            fatal: false,
        };
        loop {
            match self.next_message() {
                Ok(Some(WorkerMessage::Event(event))) => relay.emit(event),
                Ok(Some(WorkerMessage::Hello(_))) => {
                    return Err(SupervisorError::ProtocolError {
                        expected: "Event".to_string(),
                        got: "Hello".to_string(),
                    });
                }
                Ok(None) if relay.ended || relay.fatal => return Ok(()),
                Ok(None) => {
                    return Err(SupervisorError::WorkerCrashed(self.exit_description()));
                }
                Err(SupervisorError::Timeout(timeout)) => {
                    self.handle_timeout(&mut relay);
                    return Err(SupervisorError::Timeout(timeout));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read the next message before the deadline; `None` on end of stream.
    fn next_message(&mut self) -> Result<Option<WorkerMessage>, SupervisorError> {
        loop {
            let remaining = self.deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SupervisorError::Timeout(self.timeout));
            }

            // Buffered data may be an incomplete frame that never completes
            if !self.reader.has_buffered_data() {
                let poll_timeout = remaining.min(Duration::from_millis(100));
                match wait_for_data(self.msg_read_fd, poll_timeout.as_millis() as i32) {
                    PollResult::DataAvailable => {}
                    PollResult::Timeout => continue,
                    PollResult::PipeClosed => return Ok(None),
                    PollResult::Error(e) => {
                        return Err(SupervisorError::WorkerCrashed(format!("Pipe error: {}", e)));
                    }
                }
            }

            return match self.reader.recv::<WorkerMessage>() {
                Ok(msg) => Ok(Some(msg)),
                Err(e) if e.is_end_of_stream() => Ok(None),
                Err(e) => {
                    if !self.is_alive() {
                        return Err(SupervisorError::WorkerCrashed(self.exit_description()));
                    }
                    Err(e.into())
                }
            };
        }
    }

    /// SIGTERM, relay whatever the worker flushes within 500ms, then SIGKILL.
    fn handle_timeout(&mut self, sink: &mut dyn EventSink) {
        let _ = send_sigterm(self.child.id());

        let drain_deadline = Instant::now() + Duration::from_millis(500);
        loop {
            let remaining = drain_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match wait_for_data(self.msg_read_fd, remaining.as_millis() as i32) {
                PollResult::DataAvailable => match self.reader.recv::<WorkerMessage>() {
                    Ok(WorkerMessage::Event(event)) => sink.emit(event),
                    _ => break,
                },
                _ => break,
            }
        }

        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }

    fn exit_description(&mut self) -> String {
        let _ = self.child.kill();
        match self.child.wait() {
            Ok(status) if status.success() => {
                "worker exited before reporting a result".to_string()
            }
            Ok(status) => format!("worker exited with {}", status),
            Err(e) => format!("worker status unavailable: {}", e),
        }
    }

    /// Ask an idle worker to exit and reap it
    pub fn shutdown(mut self) -> Result<(), SupervisorError> {
        if self.is_alive() {
            // The worker may already be gone after its single test
            let _ = self.writer.send(&MasterMessage::Shutdown);
        }
        let _ = self.child.wait();
        Ok(())
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = send_sigterm(self.child.id());
            std::thread::sleep(Duration::from_millis(50));
            if self.is_alive() {
                let _ = self.child.kill();
            }
            let _ = self.child.wait();
        }
    }
}

/// Runs every test in a fresh worker process.
///
/// The master only declares suites to discover them (test bodies are not
/// kept); each worker rebuilds the suite along the test's location.
pub struct IsolatedExecutor {
    suite: String,
    setups: Vec<String>,
    options: TestOptions,
    timeout: Duration,
    binary: Option<PathBuf>,
}

impl IsolatedExecutor {
    /// Executor for one suite; `options` are the run-wide options the
    /// worker starts from
    pub fn new(suite: &str, setups: Vec<String>, options: TestOptions, timeout: Duration) -> Self {
        Self {
            suite: suite.to_string(),
            setups,
            options,
            timeout,
            binary: None,
        }
    }

    /// Spawn workers from `binary` instead of the current executable
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    fn spawn(&self) -> Result<WorkerHandle, SupervisorError> {
        match &self.binary {
            Some(binary) => WorkerHandle::spawn_binary(binary, self.timeout),
            None => WorkerHandle::spawn(self.timeout),
        }
    }
}

impl TestExecutor for IsolatedExecutor {
    fn build_mode(&self) -> BuildMode {
        BuildMode::Discover
    }

    fn execute(&mut self, tree: &mut Tree, test: NodeId, sink: &mut dyn EventSink) {
        let name = tree.node(test).name().to_string();
        let location = tree.location(test);
        let init = TestInit {
            suite: self.suite.clone(),
            setups: self.setups.clone(),
            location: location.clone(),
            options: self.options.clone(),
        };

        let mut relay = RelaySink {
            inner: sink,
            started: false,
            ended: false,
            fatal: false,
        };
        let result = self.spawn().and_then(|mut worker| {
            let outcome = worker.run_test(init, &mut relay);
            let _ = worker.shutdown();
            outcome
        });
        let started = relay.started;

        if let Err(error) = result {
            warn!(test = %name, ?location, %error, "worker failed");
            if !started {
                sink.emit(LifecycleEvent::TestStart {
                    name: name.clone(),
                    location,
                });
            }
            sink.emit(LifecycleEvent::Error {
                message: error.to_string(),
            });
            sink.emit(LifecycleEvent::TestEnd {
                name,
                duration: Default::default(),
                memory: Default::default(),
            });
        }
    }
}
