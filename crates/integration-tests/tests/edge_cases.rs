//! Edge cases of the supervisor against real processes
//!
//! A counting launcher wraps the real one so the number of kill calls can
//! be asserted.

#![cfg(unix)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gpuwatch_core::application::Supervisor;
use gpuwatch_core::domain::{Command, ExitStatus, RunOutcome, RunResult, SignalKind};
use gpuwatch_core::port::output_sink::mocks::RecordingSink;
use gpuwatch_core::port::{ProcessError, ProcessLauncher, RunningProcess, SpawnedProcess};
use gpuwatch_infra_system::TokioProcessLauncher;

const LAVAPIPE_WARNING: &str =
    "WARNING: lavapipe is not a conformant vulkan implementation, testing use only.";

const RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Counts terminate calls on every process it starts
struct CountingLauncher {
    inner: TokioProcessLauncher,
    terminations: Arc<AtomicUsize>,
}

struct CountingProcess {
    inner: Box<dyn RunningProcess>,
    terminations: Arc<AtomicUsize>,
}

#[async_trait]
impl ProcessLauncher for CountingLauncher {
    async fn start(&self, command: &Command) -> Result<SpawnedProcess, ProcessError> {
        let spawned = self.inner.start(command).await?;
        Ok(SpawnedProcess {
            process: Box::new(CountingProcess {
                inner: spawned.process,
                terminations: Arc::clone(&self.terminations),
            }),
            streams: spawned.streams,
        })
    }
}

#[async_trait]
impl RunningProcess for CountingProcess {
    fn pid(&self) -> Option<u32> {
        self.inner.pid()
    }

    async fn terminate(&mut self) -> Result<(), ProcessError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        self.inner.terminate().await
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        self.inner.try_wait()
    }

    async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        self.inner.wait().await
    }

    async fn kill_remaining(&mut self) -> Result<(), ProcessError> {
        self.inner.kill_remaining().await
    }
}

async fn run_counted(script: &str) -> (RunResult, usize, Arc<RecordingSink>) {
    let terminations = Arc::new(AtomicUsize::new(0));
    let launcher = Arc::new(CountingLauncher {
        inner: TokioProcessLauncher::default(),
        terminations: Arc::clone(&terminations),
    });
    let sink = Arc::new(RecordingSink::new());
    let supervisor = Supervisor::with_defaults(launcher, sink.clone());
    let command = Command::new("sh", ["-c", script]).unwrap();

    let result = tokio::time::timeout(RUN_TIMEOUT, supervisor.run(&command))
        .await
        .expect("run should finish")
        .unwrap();
    (result, terminations.load(Ordering::SeqCst), sink)
}

/// Degraded lines on both streams still produce a single kill
#[tokio::test]
async fn test_repeated_degraded_lines_kill_once() {
    let script = format!(
        "for i in 1 2 3; do echo '{w}'; echo '{w}' >&2; done; exec sleep 30",
        w = LAVAPIPE_WARNING
    );

    let (result, kills, _sink) = run_counted(&script).await;

    assert_eq!(kills, 1);
    assert_eq!(result.outcome, RunOutcome::Terminated);
    // The kill may land before the shell wrote every line
    assert!(result.signals.degraded_backend_detected >= 1);
}

/// Capable-backend lines never terminate, on either stream
#[tokio::test]
async fn test_capable_lines_on_both_streams_do_not_kill() {
    let (result, kills, sink) =
        run_counted("echo 'FINISHME: a'; echo 'FINISHME: b' >&2; sleep 0.2; exit 0").await;

    assert_eq!(kills, 0);
    assert_eq!(result.outcome, RunOutcome::NaturalExit);
    assert_eq!(result.exit_status, ExitStatus::from_code(0));
    assert_eq!(sink.signals().len(), 2);
}

/// An unterminated final line is never classified
#[tokio::test]
async fn test_partial_final_line_is_ignored() {
    let script = format!("printf '%s' '{}' >&2; exit 0", LAVAPIPE_WARNING);

    let (result, kills, sink) = run_counted(&script).await;

    assert_eq!(kills, 0);
    assert!(result.signals.is_empty());
    assert!(sink.lines().is_empty());
    assert_eq!(result.outcome, RunOutcome::NaturalExit);
}

/// A background grandchild holding the pipes does not stall draining
#[tokio::test]
async fn test_grandchild_holding_pipes_is_killed_with_group() {
    let script = format!("sleep 30 & echo '{}' >&2; wait", LAVAPIPE_WARNING);

    let (result, kills, _sink) = run_counted(&script).await;

    assert_eq!(kills, 1);
    assert_eq!(result.outcome, RunOutcome::Terminated);
}

/// Degraded line right before a natural exit: a natural exit code is never
/// reported as a forced termination
#[tokio::test]
async fn test_exit_racing_with_detection_is_consistent() {
    let script = format!("echo '{}' >&2; exit 0", LAVAPIPE_WARNING);

    for _ in 0..20 {
        let (result, kills, _sink) = run_counted(&script).await;

        assert!(kills <= 1);
        assert_eq!(result.termination_issued, kills == 1);
        match result.outcome {
            RunOutcome::Terminated => assert_eq!(result.exit_status.signal, Some(9)),
            RunOutcome::NaturalExit => assert_eq!(result.exit_status, ExitStatus::from_code(0)),
        }
        assert!(result.signals.contains(SignalKind::DegradedBackendDetected));
    }
}

/// A backgrounded child left running after a natural exit does not hold the run
#[tokio::test]
async fn test_background_child_after_natural_exit_does_not_stall() {
    let started = Instant::now();

    let (result, kills, sink) = run_counted("sleep 5 & echo 'FINISHME: ok'; exit 0").await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(kills, 0);
    assert_eq!(result.outcome, RunOutcome::NaturalExit);
    assert_eq!(result.exit_status, ExitStatus::from_code(0));
    assert_eq!(sink.signals(), vec![SignalKind::CapableBackendConfirmed]);
}

/// Output written before the degraded line is still passed through
#[tokio::test]
async fn test_lines_before_detection_are_preserved() {
    let script = format!(
        "echo 'init vulkan'; echo 'frame 1'; echo '{}' >&2; exec sleep 30",
        LAVAPIPE_WARNING
    );

    let (result, _kills, sink) = run_counted(&script).await;

    assert_eq!(result.outcome, RunOutcome::Terminated);
    let lines: Vec<String> = sink.lines().into_iter().map(|(_, line)| line).collect();
    assert!(lines.contains(&"init vulkan".to_string()));
    assert!(lines.contains(&"frame 1".to_string()));
    assert!(lines.contains(&LAVAPIPE_WARNING.to_string()));
}
