// Supervisor - launches the command and stops it on a degraded backend

pub mod constants;
mod termination;

use constants::*;
pub use termination::TerminationGuard;

use crate::application::classifier::{ClassifierStats, StreamClassifier};
use crate::domain::{
    ClassificationEvent, Command, ExitStatus, ObservedSignals, RunId, RunOutcome, RunResult,
    StreamSource, SupervisorState,
};
use crate::error::{AppError, Result};
use crate::port::{
    IdProvider, OutputSink, ProcessLauncher, RunningProcess, SpawnedProcess, TimeProvider,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Abort the run when the kill fails instead of logging and waiting
    pub fail_on_termination_error: bool,
    pub event_channel_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            fail_on_termination_error: false,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

/// Mutable bookkeeping of one run, owned by the supervisor task
#[derive(Default)]
struct RunTracker {
    guard: TerminationGuard,
    signals: ObservedSignals,
    termination_error: Option<String>,
}

/// Supervisor runs one command under observation
///
/// Launching -> Running -> Draining -> Finished. Both output streams are
/// classified by their own task; only the supervisor may terminate the child.
pub struct Supervisor {
    launcher: Arc<dyn ProcessLauncher>,
    sink: Arc<dyn OutputSink>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        sink: Arc<dyn OutputSink>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            launcher,
            sink,
            id_provider,
            time_provider,
            config,
        }
    }

    /// Create a supervisor with UUID run ids, the system clock and default config
    pub fn with_defaults(launcher: Arc<dyn ProcessLauncher>, sink: Arc<dyn OutputSink>) -> Self {
        use crate::port::id_provider::UuidProvider;
        use crate::port::time_provider::SystemTimeProvider;

        Self::new(
            launcher,
            sink,
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
            SupervisorConfig::default(),
        )
    }

    /// Run the command to completion
    ///
    /// # Errors
    /// - ProcessError::LaunchFailed / StreamSetupFailed if the child cannot be started
    /// - ProcessError::WaitFailed if waiting on the child fails
    /// - ProcessError::TerminationFailed if the kill fails and
    ///   `fail_on_termination_error` is set
    /// - AppError::Internal if a classifier task panicked
    pub async fn run(&self, command: &Command) -> Result<RunResult> {
        let run_id = self.id_provider.generate_id();
        let span = info_span!("run", run_id = %run_id);
        self.run_internal(command, run_id).instrument(span).await
    }

    async fn run_internal(&self, command: &Command, run_id: RunId) -> Result<RunResult> {
        let started_at = self.time_provider.now_millis();
        let state = SupervisorState::Launching;

        info!(command = %command, "Launching command");

        let SpawnedProcess {
            mut process,
            streams,
        } = match self.launcher.start(command).await {
            Ok(spawned) => spawned,
            Err(e) => {
                error!(command = %command, error = %e, "Launch failed");
                self.advance(state, SupervisorState::Finished)?;
                return Err(e.into());
            }
        };

        info!(pid = ?process.pid(), "Process started");

        let (event_tx, mut event_rx) = mpsc::channel(self.config.event_channel_capacity);
        let stdout_task =
            self.spawn_classifier(StreamSource::Stdout, streams.stdout, event_tx.clone());
        let stderr_task = self.spawn_classifier(StreamSource::Stderr, streams.stderr, event_tx);
        let state = self.advance(state, SupervisorState::Running)?;

        let mut tracker = RunTracker::default();
        let mut events_open = true;

        // Running: wait for exit, terminating on the first degraded signal.
        // Exit is polled first so an exited child is never reported as killed.
        let wait_result = loop {
            tokio::select! {
                biased;
                status = process.wait() => break status,
                event = event_rx.recv(), if events_open => match event {
                    Some(event) => {
                        let handled = self
                            .on_running_event(&event, &mut *process, &mut tracker)
                            .await;
                        if let Err(e) = handled {
                            stdout_task.abort();
                            stderr_task.abort();
                            return Err(e);
                        }
                    }
                    None => {
                        debug!("Both streams closed before process exit");
                        events_open = false;
                    }
                },
            }
        };

        let exit_status = match wait_result {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "Wait failed");
                stdout_task.abort();
                stderr_task.abort();
                return Err(e.into());
            }
        };

        info!(exit_status = %exit_status, "Process exited");

        // Background children still hold the pipes open
        if let Err(e) = process.kill_remaining().await {
            warn!(error = %e, "Failed to kill processes left behind by the child");
        }
        let state = self.advance(state, SupervisorState::Draining)?;

        // Draining: late events are recorded but the process is already gone
        while let Some(event) = event_rx.recv().await {
            self.record_event(&event, &mut tracker);
            if event.signal.requires_termination() {
                debug!(
                    source = %event.source,
                    "Degraded backend reported after exit, nothing to terminate"
                );
            }
        }

        let (stdout_stats, stderr_stats) = tokio::join!(stdout_task, stderr_task);
        let stdout_stats = Self::join_classifier(StreamSource::Stdout, stdout_stats)?;
        let stderr_stats = Self::join_classifier(StreamSource::Stderr, stderr_stats)?;
        debug!(
            stdout_lines = stdout_stats.lines,
            stderr_lines = stderr_stats.lines,
            "Streams drained"
        );

        self.advance(state, SupervisorState::Finished)?;

        let result = self.build_result(run_id, command, exit_status, tracker, started_at);
        info!(
            outcome = ?result.outcome,
            exit_status = %result.exit_status,
            duration_ms = %result.duration_ms,
            "Run finished"
        );
        Ok(result)
    }

    fn spawn_classifier<R>(
        &self,
        source: StreamSource,
        stream: R,
        events: mpsc::Sender<ClassificationEvent>,
    ) -> JoinHandle<ClassifierStats>
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let classifier = StreamClassifier::new(source, Arc::clone(&self.sink), events);
        tokio::spawn(classifier.run(stream))
    }

    /// Handle an event while the process may still be running
    async fn on_running_event(
        &self,
        event: &ClassificationEvent,
        process: &mut dyn RunningProcess,
        tracker: &mut RunTracker,
    ) -> Result<()> {
        self.record_event(event, tracker);

        if !event.signal.requires_termination() {
            return Ok(());
        }

        // Exited but not reaped yet: the wait branch picks the status up next
        match process.try_wait() {
            Ok(Some(status)) => {
                debug!(
                    exit_status = %status,
                    "Degraded backend reported after exit, nothing to terminate"
                );
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not poll process before terminating"),
        }

        if !tracker.guard.try_arm() {
            return Ok(());
        }

        warn!(
            source = %event.source,
            line = %event.line,
            pid = ?process.pid(),
            "Degraded backend detected, terminating process"
        );

        match process.terminate().await {
            Ok(()) => {
                info!("Termination signal sent");
                Ok(())
            }
            Err(e) if self.config.fail_on_termination_error => {
                error!(error = %e, "Termination failed");
                Err(e.into())
            }
            Err(e) => {
                warn!(error = %e, "Termination failed, waiting for process to exit on its own");
                tracker.termination_error = Some(e.to_string());
                Ok(())
            }
        }
    }

    fn record_event(&self, event: &ClassificationEvent, tracker: &mut RunTracker) {
        info!(source = %event.source, signal = %event.signal, "Backend signal observed");
        tracker.signals.record(event.signal);
        self.sink.signal(event);
    }

    fn join_classifier(
        source: StreamSource,
        joined: std::result::Result<ClassifierStats, tokio::task::JoinError>,
    ) -> Result<ClassifierStats> {
        joined.map_err(|e| {
            if e.is_panic() {
                error!(source = %source, "Classifier panicked");
            }
            AppError::Internal(format!("{} classifier failed: {}", source, e))
        })
    }

    fn advance(&self, from: SupervisorState, to: SupervisorState) -> Result<SupervisorState> {
        let next = from.transition(to)?;
        debug!(from = %from, to = %next, "Supervisor state transition");
        Ok(next)
    }

    fn build_result(
        &self,
        run_id: RunId,
        command: &Command,
        exit_status: ExitStatus,
        tracker: RunTracker,
        started_at: i64,
    ) -> RunResult {
        let termination_issued = tracker.guard.is_armed();
        // A kill that raced a natural exit leaves a regular exit code behind
        let killed = termination_issued
            && tracker.termination_error.is_none()
            && exit_status.signal.is_some();
        let outcome = if killed {
            RunOutcome::Terminated
        } else {
            RunOutcome::NaturalExit
        };

        RunResult {
            run_id,
            command: command.to_string(),
            outcome,
            exit_status,
            signals: tracker.signals,
            termination_issued,
            termination_error: tracker.termination_error,
            duration_ms: self.time_provider.now_millis() - started_at,
        }
    }
}
