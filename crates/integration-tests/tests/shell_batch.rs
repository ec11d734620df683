//! End-to-end batches through the real shell executor and command file reader
//!
//! Load sampling is stubbed (low load) so results do not depend on the host.
#![cfg(unix)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use batchrun_core::application::{Dispatcher, DispatcherConfig};
use batchrun_core::domain::{Command, OutcomeStatus};
use batchrun_core::port::system_probe::mocks::MockSystemProbe;
use batchrun_core::port::time_provider::SystemTimeProvider;
use batchrun_core::port::{ExecutionError, ExecutionResult, TaskExecutor};
use batchrun_infra_system::{read_command_file, ShellExecutor};

fn command_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "batchrun_shell_batch_{}_{}.txt",
        name,
        std::process::id()
    ));
    std::fs::write(&path, contents).unwrap();
    path
}

fn fast_config(max_parallel: usize) -> DispatcherConfig {
    DispatcherConfig {
        max_parallel,
        backoff: Duration::from_millis(5),
        ..Default::default()
    }
}

fn shell() -> ShellExecutor {
    ShellExecutor::new(Arc::new(SystemTimeProvider))
}

fn dispatcher(config: DispatcherConfig, executor: Arc<dyn TaskExecutor>) -> Dispatcher {
    Dispatcher::new(
        config,
        Arc::new(MockSystemProbe::low_load()),
        executor,
        Arc::new(SystemTimeProvider),
    )
}

/// Shell executor wrapper that counts concurrently running commands
struct CountingExecutor {
    inner: ShellExecutor,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl CountingExecutor {
    fn new(inner: ShellExecutor) -> Self {
        Self {
            inner,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TaskExecutor for CountingExecutor {
    async fn execute(&self, command: &Command) -> Result<ExecutionResult, ExecutionError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.inner.execute(command).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[tokio::test]
async fn test_blank_lines_do_not_create_workers() {
    let path = command_file(
        "blank_lines",
        "echo first\n\n   \necho second >&2\n\t\n\nexit 4\n\n",
    );
    let commands = read_command_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(commands.len(), 3);

    let report = dispatcher(fast_config(2), Arc::new(shell()))
        .run(commands)
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].index, 2);
    assert_eq!(
        report.failures[0].status,
        OutcomeStatus::Failed { exit_code: Some(4) }
    );
}

#[tokio::test]
async fn test_failure_keeps_stderr_for_diagnosis() {
    let path = command_file(
        "stderr",
        "echo 'snaphu: phase unwrapping failed for 20200101_20200113' >&2; exit 1\ntrue\n",
    );
    let commands = read_command_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let report = dispatcher(fast_config(5), Arc::new(shell()))
        .run(commands)
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    let stderr = report.failures[0].stderr.clone().unwrap_or_default();
    assert!(stderr.contains("phase unwrapping failed"), "stderr: {:?}", stderr);
}

#[tokio::test]
async fn test_unknown_program_fails_through_shell() {
    let path = command_file("unknown", "batchrun_definitely_not_a_program --help\n");
    let commands = read_command_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let report = dispatcher(fast_config(1), Arc::new(shell()))
        .run(commands)
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(
        report.failures[0].status,
        OutcomeStatus::Failed {
            exit_code: Some(127)
        }
    );
}

#[tokio::test]
async fn test_real_processes_respect_ceiling() {
    let lines: String = (0..6).map(|i| format!("sleep 0.1; echo {}\n", i)).collect();
    let path = command_file("ceiling", &lines);
    let commands = read_command_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let executor = Arc::new(CountingExecutor::new(shell()));
    let report = dispatcher(fast_config(3), executor.clone())
        .run(commands)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 6);
    assert!(executor.peak.load(Ordering::SeqCst) <= 3);
    assert!(report.peak_active <= 3);
    assert_eq!(executor.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_shell_is_recorded_per_command() {
    let path = command_file("no_shell", "true\ntrue\n");
    let commands = read_command_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let executor = Arc::new(shell().with_shell("/nonexistent/bin/sh"));
    let report = dispatcher(fast_config(2), executor)
        .run(commands)
        .await
        .unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.failed, 2);
    assert!(report
        .failures
        .iter()
        .all(|o| matches!(o.status, OutcomeStatus::LaunchFailed { .. })));
}

#[tokio::test]
async fn test_timeout_extension_terminates_long_command() {
    let path = command_file("timeout", "echo partial >&2; sleep 30\necho quick\n");
    let commands = read_command_file(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let executor = Arc::new(shell().with_timeout(Some(Duration::from_millis(300))));
    let report = tokio::time::timeout(
        Duration::from_secs(10),
        dispatcher(fast_config(2), executor).run(commands),
    )
    .await
    .expect("timed-out command must not block join-all")
    .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(
        report.failures[0].status,
        OutcomeStatus::TimedOut { after_ms: 300 }
    );
    let stderr = report.failures[0].stderr.as_deref().unwrap_or_default();
    assert!(stderr.contains("partial"), "stderr: {:?}", stderr);
}

#[tokio::test]
async fn test_missing_command_file_is_config_error() {
    let err = read_command_file("/nonexistent/run_11_unwrap.txt").unwrap_err();
    assert!(err.is_config());
}
