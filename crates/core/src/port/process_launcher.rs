// Process Launcher Port (ADR-002)
// Abstraction for spawning, killing and reaping the supervised command

use crate::domain::{Command, ExitStatus};
use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Readable byte stream of a child process
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Launch failed: {0}")]
    LaunchFailed(String),

    #[error("Stream setup failed: {0}")]
    StreamSetupFailed(String),

    #[error("Termination failed: {0}")]
    TerminationFailed(String),

    #[error("Wait failed: {0}")]
    WaitFailed(String),
}

/// Output streams of a freshly spawned child
///
/// Handed to the stream classifiers. They never see the process handle.
pub struct ProcessStreams {
    pub stdout: OutputStream,
    pub stderr: OutputStream,
}

/// Result of a successful launch
pub struct SpawnedProcess {
    pub process: Box<dyn RunningProcess>,
    pub streams: ProcessStreams,
}

/// Handle to a live child process, owned by the supervisor
#[async_trait]
pub trait RunningProcess: Send {
    /// OS process id, None once the process has been reaped
    fn pid(&self) -> Option<u32>;

    /// Forcefully kill the process
    ///
    /// Succeeds on a process that already exited. Does not wait for exit.
    ///
    /// # Errors
    /// - ProcessError::TerminationFailed if the kill signal could not be delivered
    async fn terminate(&mut self) -> Result<(), ProcessError>;

    /// Exit status if the process already exited, without blocking
    ///
    /// # Errors
    /// - ProcessError::WaitFailed if the OS status query fails
    fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError>;

    /// Wait for the process to exit
    ///
    /// Cancel safe: the future may be dropped and `wait` called again.
    ///
    /// # Errors
    /// - ProcessError::WaitFailed if the OS wait call fails
    async fn wait(&mut self) -> Result<ExitStatus, ProcessError>;

    /// Kill whatever the process left behind once it has been reaped
    ///
    /// Background children inherit the output pipes; until they are gone the
    /// streams never reach EOF. No-op where the process has no group of its own.
    ///
    /// # Errors
    /// - ProcessError::TerminationFailed if the leftovers could not be signalled
    async fn kill_remaining(&mut self) -> Result<(), ProcessError> {
        Ok(())
    }
}

/// Process Launcher trait
///
/// Implementations:
/// - TokioProcessLauncher: spawns a real OS process (infra-system)
/// - MockProcessLauncher: scripted output for supervisor tests
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Spawn the command with stdout and stderr piped
    ///
    /// # Errors
    /// - ProcessError::LaunchFailed if the executable cannot be found or spawned
    /// - ProcessError::StreamSetupFailed if a pipe could not be obtained
    ///   (the child is killed and reaped before returning)
    async fn start(&self, command: &Command) -> Result<SpawnedProcess, ProcessError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::watch;

    /// Buffer size of the in-memory pipes
    const MOCK_PIPE_CAPACITY: usize = 64 * 1024;

    /// Signal number reported for a killed mock process
    pub const MOCK_KILL_SIGNAL: i32 = 9;

    /// How the mock process ends
    #[derive(Debug, Clone, Copy)]
    pub enum MockExit {
        /// Exit with the given code once all output is written
        Natural(i32),
        /// Keep running until `terminate` is called, then report MOCK_KILL_SIGNAL
        UntilTerminated,
    }

    /// Mock launcher behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Spawn a process writing the given bytes
        Spawn {
            stdout: Vec<u8>,
            stderr: Vec<u8>,
            exit: MockExit,
        },
        /// Fail with LaunchFailed
        LaunchFail(String),
        /// Fail with StreamSetupFailed
        StreamSetupFail(String),
    }

    /// Call counters shared between the launcher and its processes
    #[derive(Debug, Default)]
    pub struct MockStats {
        pub starts: AtomicUsize,
        pub terminations: AtomicUsize,
        pub waits_completed: AtomicUsize,
        pub leftover_kills: AtomicUsize,
    }

    /// Mock Process Launcher for testing
    pub struct MockProcessLauncher {
        behavior: MockBehavior,
        fail_termination: bool,
        stats: Arc<MockStats>,
    }

    impl MockProcessLauncher {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                fail_termination: false,
                stats: Arc::new(MockStats::default()),
            }
        }

        pub fn spawning(
            stdout: impl Into<Vec<u8>>,
            stderr: impl Into<Vec<u8>>,
            exit: MockExit,
        ) -> Self {
            Self::new(MockBehavior::Spawn {
                stdout: stdout.into(),
                stderr: stderr.into(),
                exit,
            })
        }

        pub fn launch_failing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::LaunchFail(message.into()))
        }

        pub fn stream_setup_failing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::StreamSetupFail(message.into()))
        }

        /// Make every `terminate` call fail (the process still exits with code 0)
        pub fn with_failing_termination(mut self) -> Self {
            self.fail_termination = true;
            self
        }

        pub fn start_count(&self) -> usize {
            self.stats.starts.load(Ordering::SeqCst)
        }

        pub fn termination_count(&self) -> usize {
            self.stats.terminations.load(Ordering::SeqCst)
        }

        pub fn wait_count(&self) -> usize {
            self.stats.waits_completed.load(Ordering::SeqCst)
        }

        pub fn leftover_kill_count(&self) -> usize {
            self.stats.leftover_kills.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProcessLauncher for MockProcessLauncher {
        async fn start(&self, _command: &Command) -> Result<SpawnedProcess, ProcessError> {
            self.stats.starts.fetch_add(1, Ordering::SeqCst);

            let (stdout, stderr, exit) = match &self.behavior {
                MockBehavior::Spawn {
                    stdout,
                    stderr,
                    exit,
                } => (stdout.clone(), stderr.clone(), *exit),
                MockBehavior::LaunchFail(msg) => {
                    return Err(ProcessError::LaunchFailed(msg.clone()))
                }
                MockBehavior::StreamSetupFail(msg) => {
                    return Err(ProcessError::StreamSetupFailed(msg.clone()))
                }
            };

            let (mut out_writer, out_reader) = tokio::io::duplex(MOCK_PIPE_CAPACITY);
            let (mut err_writer, err_reader) = tokio::io::duplex(MOCK_PIPE_CAPACITY);
            let (terminate_tx, mut terminate_rx) = watch::channel(false);
            let (exit_tx, exit_rx) = watch::channel(None);
            let fail_termination = self.fail_termination;

            // Feeder plays the child: write output, then exit
            tokio::spawn(async move {
                let _ = out_writer.write_all(&stdout).await;
                let _ = err_writer.write_all(&stderr).await;

                let status = match exit {
                    MockExit::Natural(code) => ExitStatus::from_code(code),
                    MockExit::UntilTerminated => {
                        let _ = terminate_rx.wait_for(|requested| *requested).await;
                        if fail_termination {
                            ExitStatus::from_code(0)
                        } else {
                            ExitStatus::from_signal(MOCK_KILL_SIGNAL)
                        }
                    }
                };

                drop(out_writer);
                drop(err_writer);
                let _ = exit_tx.send(Some(status));
            });

            Ok(SpawnedProcess {
                process: Box::new(MockRunningProcess {
                    terminate_tx,
                    exit_rx,
                    fail_termination,
                    stats: Arc::clone(&self.stats),
                }),
                streams: ProcessStreams {
                    stdout: Box::new(out_reader),
                    stderr: Box::new(err_reader),
                },
            })
        }
    }

    struct MockRunningProcess {
        terminate_tx: watch::Sender<bool>,
        exit_rx: watch::Receiver<Option<ExitStatus>>,
        fail_termination: bool,
        stats: Arc<MockStats>,
    }

    #[async_trait]
    impl RunningProcess for MockRunningProcess {
        fn pid(&self) -> Option<u32> {
            if self.exit_rx.borrow().is_some() {
                None
            } else {
                Some(4242)
            }
        }

        async fn terminate(&mut self) -> Result<(), ProcessError> {
            self.stats.terminations.fetch_add(1, Ordering::SeqCst);
            self.terminate_tx.send_replace(true);

            if self.fail_termination {
                return Err(ProcessError::TerminationFailed(
                    "mock kill refused".to_string(),
                ));
            }
            Ok(())
        }

        fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
            Ok(*self.exit_rx.borrow())
        }

        async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
            let status = {
                let guard = self
                    .exit_rx
                    .wait_for(Option::is_some)
                    .await
                    .map_err(|e| ProcessError::WaitFailed(e.to_string()))?;
                *guard
            };

            let status = status
                .ok_or_else(|| ProcessError::WaitFailed("mock process vanished".to_string()))?;
            self.stats.waits_completed.fetch_add(1, Ordering::SeqCst);
            Ok(status)
        }

        async fn kill_remaining(&mut self) -> Result<(), ProcessError> {
            self.stats.leftover_kills.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
