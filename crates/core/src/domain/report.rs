// Run outcomes - per-command results and the aggregate batch report

use serde::Serialize;

/// Final status of one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Exited with status 0
    Succeeded,
    /// Ran but exited non-zero (`exit_code` is None when killed by a signal)
    Failed { exit_code: Option<i32> },
    /// The child process could not be started or waited on
    LaunchFailed { reason: String },
    /// Exceeded the per-command timeout and was terminated
    TimedOut { after_ms: u64 },
    /// The worker itself crashed before producing a result
    Panicked { message: String },
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Succeeded)
    }

    /// Short human-readable label, e.g. for the failure table
    pub fn label(&self) -> String {
        match self {
            OutcomeStatus::Succeeded => "succeeded".to_string(),
            OutcomeStatus::Failed {
                exit_code: Some(code),
            } => format!("exit code {}", code),
            OutcomeStatus::Failed { exit_code: None } => "killed by signal".to_string(),
            OutcomeStatus::LaunchFailed { reason } => format!("launch failed: {}", reason),
            OutcomeStatus::TimedOut { after_ms } => format!("timed out after {}ms", after_ms),
            OutcomeStatus::Panicked { message } => format!("worker panicked: {}", message),
        }
    }
}

/// Result of running one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub index: usize,
    pub command: String,
    pub status: OutcomeStatus,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Aggregate outcome of one batch
///
/// Built incrementally as workers finish; `finalize` is called once every
/// worker has joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Highest number of simultaneously active workers seen during the run
    pub peak_active: usize,
    pub started_at_ms: i64,
    pub finished_at_ms: Option<i64>,
    /// Failing commands, ordered by input position after `finalize`
    pub failures: Vec<CommandOutcome>,
}

impl RunReport {
    pub fn new(total: usize, started_at_ms: i64) -> Self {
        Self {
            total,
            succeeded: 0,
            failed: 0,
            peak_active: 0,
            started_at_ms,
            finished_at_ms: None,
            failures: Vec::new(),
        }
    }

    /// Fold one command outcome into the report
    pub fn record(&mut self, outcome: CommandOutcome) {
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            self.failures.push(outcome);
        }
    }

    pub fn observe_active(&mut self, active: usize) {
        self.peak_active = self.peak_active.max(active);
    }

    /// Number of commands with a recorded outcome
    pub fn resolved(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_finalized(&self) -> bool {
        self.finished_at_ms.is_some()
    }

    /// True when every command has an outcome and none failed
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.resolved() == self.total
    }

    pub fn finalize(&mut self, finished_at_ms: i64) {
        self.failures.sort_by_key(|outcome| outcome.index);
        self.finished_at_ms = Some(finished_at_ms);
    }

    pub fn elapsed_ms(&self) -> Option<i64> {
        self.finished_at_ms
            .map(|finished| (finished - self.started_at_ms).max(0))
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
