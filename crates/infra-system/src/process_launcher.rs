// Process launcher implementation
// reason: async-trait, tokio for async process management (ADR-001)
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::{Child, Command as TokioCommand};
use tracing::{info, warn};

use gpuwatch_core::domain::{Command, ExitStatus};
use gpuwatch_core::port::process_launcher::{
    ProcessError, ProcessLauncher, ProcessStreams, RunningProcess, SpawnedProcess,
};

/// Launcher configuration
#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Put the child in its own process group and kill the whole group (Unix)
    pub kill_process_group: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            kill_process_group: true,
        }
    }
}

/// Spawns the supervised command as a real OS process
pub struct TokioProcessLauncher {
    config: LauncherConfig,
}

impl TokioProcessLauncher {
    /// Create a new launcher
    ///
    /// # Example
    /// ```ignore
    /// let launcher = TokioProcessLauncher::new(LauncherConfig::default());
    /// let spawned = launcher.start(&Command::parse("vkcube")?).await?;
    /// ```
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    fn build_command(&self, command: &Command) -> TokioCommand {
        let mut cmd = TokioCommand::new(command.program());
        cmd.args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        if self.config.kill_process_group {
            cmd.process_group(0);
        }

        cmd
    }

    /// Kill and reap a child whose pipes could not be taken
    async fn abandon(mut child: Child) {
        if let Err(e) = child.start_kill() {
            warn!(error = %e, "Failed to kill child after stream setup failure");
        }
        if let Err(e) = child.wait().await {
            warn!(error = %e, "Failed to reap child after stream setup failure");
        }
    }
}

impl Default for TokioProcessLauncher {
    fn default() -> Self {
        Self::new(LauncherConfig::default())
    }
}

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn start(&self, command: &Command) -> Result<SpawnedProcess, ProcessError> {
        let mut child = self
            .build_command(command)
            .spawn()
            .map_err(|e| ProcessError::LaunchFailed(format!("{}: {}", command.program(), e)))?;

        let pid = child.id();

        let streams = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => ProcessStreams {
                stdout: Box::new(stdout),
                stderr: Box::new(stderr),
            },
            (stdout, _) => {
                let missing = if stdout.is_none() { "stdout" } else { "stderr" };
                warn!(pid = ?pid, stream = missing, "Pipe unavailable, abandoning child");
                Self::abandon(child).await;
                return Err(ProcessError::StreamSetupFailed(format!(
                    "{} pipe unavailable",
                    missing
                )));
            }
        };

        info!(
            program = %command.program(),
            args = ?command.args(),
            pid = ?pid,
            "Spawned child process"
        );

        Ok(SpawnedProcess {
            process: Box::new(TokioRunningProcess {
                child,
                group_id: pid.filter(|_| self.config.kill_process_group),
                exited: false,
            }),
            streams,
        })
    }
}

/// Live child spawned by TokioProcessLauncher
pub struct TokioRunningProcess {
    child: Child,
    /// Process group to kill instead of the single pid
    #[cfg_attr(not(unix), allow(dead_code))]
    group_id: Option<u32>,
    exited: bool,
}

impl TokioRunningProcess {
    #[cfg(unix)]
    fn kill_group(pgid: u32) -> Result<(), ProcessError> {
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        info!(pgid = %pgid, "Sending SIGKILL to process group");
        match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
            // Group already gone
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ProcessError::TerminationFailed(format!(
                "SIGKILL to process group {} failed: {}",
                pgid, e
            ))),
        }
    }

    fn kill_child(&mut self) -> Result<(), ProcessError> {
        info!(pid = ?self.child.id(), "Killing child process");
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            // Already reaped
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(ProcessError::TerminationFailed(e.to_string())),
        }
    }
}

#[async_trait]
impl RunningProcess for TokioRunningProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(&mut self) -> Result<(), ProcessError> {
        if self.exited {
            return Ok(());
        }

        #[cfg(unix)]
        if let Some(pgid) = self.group_id {
            return Self::kill_group(pgid);
        }

        self.kill_child()
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        let status = self
            .child
            .try_wait()
            .map_err(|e| ProcessError::WaitFailed(e.to_string()))?;
        if status.is_some() {
            self.exited = true;
        }
        Ok(status.map(Into::into))
    }

    async fn wait(&mut self) -> Result<ExitStatus, ProcessError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ProcessError::WaitFailed(e.to_string()))?;
        self.exited = true;
        Ok(status.into())
    }

    async fn kill_remaining(&mut self) -> Result<(), ProcessError> {
        #[cfg(unix)]
        if let Some(pgid) = self.group_id {
            return Self::kill_group(pgid);
        }

        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn sh(script: &str) -> Command {
        Command::new("sh", ["-c", script]).unwrap()
    }

    async fn read_all(mut stream: gpuwatch_core::port::OutputStream) -> String {
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_start_pipes_both_streams() {
        let launcher = TokioProcessLauncher::default();

        let spawned = launcher
            .start(&sh("echo out; echo err >&2; exit 4"))
            .await
            .unwrap();
        let SpawnedProcess {
            mut process,
            streams,
        } = spawned;

        let (stdout, stderr) = tokio::join!(read_all(streams.stdout), read_all(streams.stderr));
        let status = process.wait().await.unwrap();

        assert_eq!(stdout, "out\n");
        assert_eq!(stderr, "err\n");
        assert_eq!(status, ExitStatus::from_code(4));
        assert!(process.pid().is_none());
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let launcher = TokioProcessLauncher::default();
        let command = Command::parse("/nonexistent/gpuwatch-missing-binary").unwrap();

        let result = launcher.start(&command).await;

        assert!(matches!(result, Err(ProcessError::LaunchFailed(_))));
    }

    #[tokio::test]
    async fn test_terminate_kills_running_child() {
        let launcher = TokioProcessLauncher::default();
        let SpawnedProcess { mut process, .. } =
            launcher.start(&sh("exec sleep 30")).await.unwrap();

        process.terminate().await.unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), process.wait())
            .await
            .expect("killed process should exit")
            .unwrap();

        assert_eq!(status.signal, Some(9));
        assert_eq!(status.code, None);
    }

    #[tokio::test]
    async fn test_terminate_after_exit_is_ok() {
        let launcher = TokioProcessLauncher::default();
        let SpawnedProcess { mut process, .. } = launcher.start(&sh("exit 0")).await.unwrap();

        process.wait().await.unwrap();

        assert!(process.terminate().await.is_ok());
        assert!(process.terminate().await.is_ok());
    }

    #[tokio::test]
    async fn test_try_wait_reports_exit_without_blocking() {
        let launcher = TokioProcessLauncher::default();
        let SpawnedProcess { mut process, .. } =
            launcher.start(&sh("exec sleep 30")).await.unwrap();

        assert_eq!(process.try_wait().unwrap(), None);

        process.terminate().await.unwrap();
        let status = process.wait().await.unwrap();

        assert_eq!(process.try_wait().unwrap(), Some(status));
        assert!(process.terminate().await.is_ok());
    }

    #[tokio::test]
    async fn test_kill_remaining_closes_pipes_after_natural_exit() {
        let launcher = TokioProcessLauncher::default();
        let SpawnedProcess {
            mut process,
            streams,
        } = launcher.start(&sh("sleep 30 & exit 0")).await.unwrap();

        let status = process.wait().await.unwrap();
        assert_eq!(status, ExitStatus::from_code(0));

        process.kill_remaining().await.unwrap();

        let rest = tokio::time::timeout(Duration::from_secs(5), read_all(streams.stdout))
            .await
            .expect("pipe should close once leftovers are killed");
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_group_kill_closes_pipes_held_by_grandchildren() {
        let launcher = TokioProcessLauncher::default();
        let SpawnedProcess {
            mut process,
            streams,
        } = launcher
            .start(&sh("sleep 30 & echo ready; wait"))
            .await
            .unwrap();

        let mut stdout = streams.stdout;
        let mut buf = [0u8; 6];
        stdout.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ready\n");

        process.terminate().await.unwrap();
        process.wait().await.unwrap();

        // EOF only arrives once the backgrounded sleep is dead as well
        let rest = tokio::time::timeout(Duration::from_secs(5), read_all(stdout))
            .await
            .expect("pipe should close after group kill");
        assert!(rest.is_empty());
    }
}
