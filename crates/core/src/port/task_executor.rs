// Task Executor Port
// Abstraction for running one command as a child process

use crate::domain::Command;
use async_trait::async_trait;
use thiserror::Error;

/// Result of a command that ran to completion or was stopped by its time limit
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub duration_ms: i64,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// Execution status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failed,
    /// Terminated after exceeding its time limit; output up to the kill is kept
    TimedOut { after_ms: u64 },
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process killed: {0}")]
    Killed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Task Executor trait
///
/// Implementations:
/// - ShellExecutor: runs the command line through the platform shell
/// - MockTaskExecutor: scripted behavior for tests
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run a command and wait for it to exit
    ///
    /// A non-zero exit is NOT an error: it is reported as
    /// `ExecutionStatus::Failed` with the captured stderr. Neither is a
    /// timeout, which comes back as `ExecutionStatus::TimedOut`.
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the process cannot be started
    /// - ExecutionError::Killed if the process could not be terminated
    /// - ExecutionError::IoError if waiting on the process failed
    async fn execute(&self, command: &Command) -> Result<ExecutionResult, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock Task Executor for testing
    ///
    /// Behavior is read from whitespace-separated tokens in the command text:
    /// - `sleep=<ms>`: hold the "process" open for that long
    /// - `exit=<code>`: exit with that code (default 0)
    /// - `launch-error`: fail to spawn
    /// - `timeout`: report a timeout
    /// - `panic`: panic inside the worker
    ///
    /// Any other token is ignored, so `"job-3 sleep=20"` simply succeeds
    /// after 20ms. The executor tracks how many commands run at once.
    #[derive(Default)]
    pub struct MockTaskExecutor {
        active: Arc<AtomicUsize>,
        peak: AtomicUsize,
        calls: Mutex<Vec<String>>,
    }

    /// Decrements the active counter even if the mock panics
    struct ActiveGuard(Arc<AtomicUsize>);

    impl Drop for ActiveGuard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl MockTaskExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Commands in the order they started
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        /// Highest number of commands observed running at the same time
        pub fn peak_concurrency(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        pub fn active(&self) -> usize {
            self.active.load(Ordering::SeqCst)
        }

        fn token_value<T: std::str::FromStr>(line: &str, key: &str) -> Option<T> {
            line.split_whitespace()
                .filter_map(|token| token.strip_prefix(key))
                .find_map(|value| value.parse().ok())
        }

        fn has_token(line: &str, token: &str) -> bool {
            line.split_whitespace().any(|t| t == token)
        }
    }

    #[async_trait]
    impl TaskExecutor for MockTaskExecutor {
        async fn execute(&self, command: &Command) -> Result<ExecutionResult, ExecutionError> {
            let line = command.as_str();
            self.calls.lock().unwrap().push(line.to_string());

            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            let _guard = ActiveGuard(Arc::clone(&self.active));
            self.peak.fetch_max(now_active, Ordering::SeqCst);

            let sleep_ms: u64 = Self::token_value(line, "sleep=").unwrap_or(0);
            if sleep_ms > 0 {
                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
            }

            if Self::has_token(line, "panic") {
                panic!("mock executor panic for '{}'", line);
            }
            if Self::has_token(line, "launch-error") {
                return Err(ExecutionError::SpawnFailed(
                    "mock: No such file or directory".to_string(),
                ));
            }
            if Self::has_token(line, "timeout") {
                return Ok(ExecutionResult {
                    status: ExecutionStatus::TimedOut { after_ms: sleep_ms },
                    duration_ms: sleep_ms as i64,
                    exit_code: None,
                    stdout: None,
                    stderr: Some("mock: still running".to_string()),
                });
            }

            let exit_code: i32 = Self::token_value(line, "exit=").unwrap_or(0);
            let (status, stderr) = if exit_code == 0 {
                (ExecutionStatus::Success, None)
            } else {
                (
                    ExecutionStatus::Failed,
                    Some(format!("mock failure (exit {})", exit_code)),
                )
            };

            Ok(ExecutionResult {
                status,
                duration_ms: sleep_ms as i64,
                exit_code: Some(exit_code),
                stdout: Some("mock output".to_string()),
                stderr,
            })
        }
    }
}
