// Shell executor implementation
// reason: tokio::process for async child management, nix for process-group signals
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as ProcessCommand};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};

use batchrun_core::domain::Command;
use batchrun_core::port::task_executor::{
    ExecutionError, ExecutionResult, ExecutionStatus, TaskExecutor,
};
use batchrun_core::port::TimeProvider;

#[cfg(unix)]
const DEFAULT_SHELL: &str = "sh";
#[cfg(unix)]
const SHELL_COMMAND_FLAG: &str = "-c";

#[cfg(windows)]
const DEFAULT_SHELL: &str = "cmd";
#[cfg(windows)]
const SHELL_COMMAND_FLAG: &str = "/C";

/// Shell executor
/// Runs each command line through the platform shell as its own child process
pub struct ShellExecutor {
    time_provider: Arc<dyn TimeProvider>,
    shell: String,
    timeout: Option<Duration>,
}

impl ShellExecutor {
    /// Create a new shell executor (platform shell, no timeout)
    ///
    /// # Example
    /// ```ignore
    /// let executor = ShellExecutor::new(Arc::new(SystemTimeProvider))
    ///     .with_timeout(Some(Duration::from_secs(3600)));
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            time_provider,
            shell: DEFAULT_SHELL.to_string(),
            timeout: None,
        }
    }

    /// Use a different shell binary (must accept the platform's command flag)
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Terminate commands that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self, line: &str) -> ProcessCommand {
        let mut command = ProcessCommand::new(&self.shell);
        command
            .arg(SHELL_COMMAND_FLAG)
            .arg(line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // A timeout kill must reach the whole pipeline, so the command gets
        // its own process group. Without a timeout it stays in ours and
        // receives the terminal's Ctrl-C together with batchrun.
        #[cfg(unix)]
        if self.timeout.is_some() {
            command.process_group(0);
        }

        command
    }

    /// Spawn child process and wait for it, collecting its output
    async fn spawn_and_wait(
        &self,
        line: &str,
    ) -> Result<(Waited, Option<String>, Option<String>), ExecutionError> {
        let mut child = self
            .build_command(line)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;

        #[cfg(unix)]
        let mut group = GroupReaper::arm(&child, self.timeout.is_some());

        let stdout_reader = child.stdout.take().map(|pipe| tokio::spawn(read_pipe(pipe)));
        let stderr_reader = child.stderr.take().map(|pipe| tokio::spawn(read_pipe(pipe)));

        let waited = match self.timeout {
            Some(limit) => match timeout(limit, child.wait()).await {
                Ok(status) => Waited::Exited(
                    status.map_err(|e| ExecutionError::IoError(e.to_string()))?,
                ),
                Err(_) => {
                    let after_ms = limit.as_millis() as u64;
                    warn!(
                        pid = ?child.id(),
                        timeout_ms = after_ms,
                        "Command exceeded timeout, terminating"
                    );
                    self.kill_graceful(&mut child).await?;
                    Waited::TimedOut(after_ms)
                }
            },
            None => Waited::Exited(
                child
                    .wait()
                    .await
                    .map_err(|e| ExecutionError::IoError(e.to_string()))?,
            ),
        };

        #[cfg(unix)]
        group.disarm();

        let (stdout, stderr) = match waited {
            Waited::Exited(_) => (
                collect_pipe(stdout_reader).await,
                collect_pipe(stderr_reader).await,
            ),
            // A detached grandchild may still hold the pipes open
            Waited::TimedOut(_) => (
                collect_pipe_bounded(stdout_reader).await,
                collect_pipe_bounded(stderr_reader).await,
            ),
        };
        Ok((waited, stdout, stderr))
    }

    /// Build execution result from process exit
    fn build_result(
        &self,
        waited: Waited,
        stdout: Option<String>,
        stderr: Option<String>,
        duration_ms: i64,
    ) -> ExecutionResult {
        let (status, exit_code) = match waited {
            Waited::Exited(status) if status.success() => {
                (ExecutionStatus::Success, status.code())
            }
            Waited::Exited(status) => (ExecutionStatus::Failed, status.code()),
            Waited::TimedOut(after_ms) => (ExecutionStatus::TimedOut { after_ms }, None),
        };

        ExecutionResult {
            status,
            exit_code,
            duration_ms,
            stdout,
            stderr,
        }
    }

    /// SIGTERM the process group, wait for the grace period, then SIGKILL
    #[cfg(unix)]
    async fn kill_graceful(&self, child: &mut Child) -> Result<(), ExecutionError> {
        use batchrun_core::application::dispatcher::constants::GRACEFUL_SHUTDOWN_TIMEOUT;
        use nix::errno::Errno;
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            // Already reaped
            return Ok(());
        };
        let pgid = Pid::from_raw(pid as i32);

        info!(pid = %pid, "Sending SIGTERM to process group");
        match killpg(pgid, Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(ExecutionError::Killed(format!("SIGTERM failed: {}", e))),
        }

        if timeout(GRACEFUL_SHUTDOWN_TIMEOUT, child.wait()).await.is_ok() {
            info!(pid = %pid, "Process exited after SIGTERM");
        } else {
            warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
        }

        // Sweep stragglers that ignored SIGTERM (or the leader itself)
        match killpg(pgid, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(ExecutionError::Killed(format!("SIGKILL failed: {}", e))),
        }
        child
            .wait()
            .await
            .map_err(|e| ExecutionError::IoError(e.to_string()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn kill_graceful(&self, child: &mut Child) -> Result<(), ExecutionError> {
        info!(pid = ?child.id(), "Killing process");
        child
            .kill()
            .await
            .map_err(|e| ExecutionError::Killed(e.to_string()))
    }
}

/// How the wait on a child ended
enum Waited {
    Exited(ExitStatus),
    TimedOut(u64),
}

/// SIGKILLs the command's process group if its wait is abandoned
///
/// Dropping the executor future (batchrun interrupted) only kills the shell
/// through `kill_on_drop`; this also takes down the rest of its group.
#[cfg(unix)]
struct GroupReaper(Option<i32>);

#[cfg(unix)]
impl GroupReaper {
    fn arm(child: &Child, own_group: bool) -> Self {
        Self(child.id().filter(|_| own_group).map(|pid| pid as i32))
    }

    fn disarm(&mut self) {
        self.0 = None;
    }
}

#[cfg(unix)]
impl Drop for GroupReaper {
    fn drop(&mut self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Some(pgid) = self.0.take() {
            warn!(pgid, "Command abandoned, killing its process group");
            let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        }
    }
}

async fn read_pipe<R>(mut pipe: R) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        warn!(error = %e, "Failed to read child output");
    }
    buf
}

async fn collect_pipe(reader: Option<JoinHandle<Vec<u8>>>) -> Option<String> {
    let bytes = reader?.await.ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

async fn collect_pipe_bounded(reader: Option<JoinHandle<Vec<u8>>>) -> Option<String> {
    use batchrun_core::application::dispatcher::constants::GRACEFUL_SHUTDOWN_TIMEOUT;

    timeout(GRACEFUL_SHUTDOWN_TIMEOUT, collect_pipe(reader))
        .await
        .ok()
        .flatten()
}

#[async_trait]
impl TaskExecutor for ShellExecutor {
    async fn execute(&self, command: &Command) -> Result<ExecutionResult, ExecutionError> {
        let start_time = self.time_provider.now_millis();

        info!(
            index = command.index(),
            command = %command,
            shell = %self.shell,
            timeout_ms = ?self.timeout.map(|t| t.as_millis() as u64),
            "Starting shell command"
        );

        let (waited, stdout, stderr) = self.spawn_and_wait(command.as_str()).await?;
        let duration_ms = self.time_provider.elapsed_since(start_time);
        let result = self.build_result(waited, stdout, stderr, duration_ms);

        info!(
            index = command.index(),
            duration_ms = %duration_ms,
            exit_code = ?result.exit_code,
            status = ?result.status,
            "Shell command completed"
        );

        Ok(result)
    }
}
