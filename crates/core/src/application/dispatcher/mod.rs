// Dispatcher - admission-controlled parallel execution of a command batch

mod admission;
mod config;
pub mod constants;
mod panic_guard;

pub use admission::{AdmissionDecision, AdmissionGate, DenyReason};
pub use config::DispatcherConfig;
pub use panic_guard::{execute_guarded_async, PanicGuardResult};

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use constants::STDERR_TAIL_BYTES;
use crate::domain::{Command, CommandOutcome, LoadSample, OutcomeStatus, RunReport};
use crate::error::Result;
use crate::port::{
    ExecutionError, ExecutionResult, ExecutionStatus, NoopObserver, RunObserver, SystemProbe,
    TaskExecutor, TimeProvider,
};

type WorkerId = u64;

/// Runs a batch of commands with bounded, load-aware parallelism
///
/// The dispatcher loop is sequential: for each command it reaps finished
/// workers, asks the admission gate, and either launches a worker or backs
/// off. Workers report back over a single-consumer channel. All run state is
/// local to one `run` call, so one dispatcher can run several batches.
pub struct Dispatcher {
    config: DispatcherConfig,
    system_probe: Arc<dyn SystemProbe>,
    task_executor: Arc<dyn TaskExecutor>,
    time_provider: Arc<dyn TimeProvider>,
    observer: Arc<dyn RunObserver>,
}

/// Mutable state of one batch
struct RunState {
    gate: AdmissionGate,
    report: RunReport,
    /// Commands admitted but not yet resolved, keyed by worker
    pending: HashMap<WorkerId, Command>,
    next_worker_id: WorkerId,
    workers: JoinSet<()>,
    outcome_tx: mpsc::UnboundedSender<(WorkerId, CommandOutcome)>,
    outcome_rx: mpsc::UnboundedReceiver<(WorkerId, CommandOutcome)>,
}

impl RunState {
    fn new(config: &DispatcherConfig, report: RunReport) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            gate: AdmissionGate::new(config),
            report,
            pending: HashMap::new(),
            next_worker_id: 0,
            workers: JoinSet::new(),
            outcome_tx,
            outcome_rx,
        }
    }

    fn active(&self) -> usize {
        self.pending.len()
    }
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        system_probe: Arc<dyn SystemProbe>,
        task_executor: Arc<dyn TaskExecutor>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            config,
            system_probe,
            task_executor,
            time_provider,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Attach a progress observer
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run every command and return the finalized report
    ///
    /// # Errors
    /// Only `AppError::Config`, raised before any command starts. Command
    /// failures of any kind are recorded in the report instead.
    pub async fn run(&self, commands: Vec<Command>) -> Result<RunReport> {
        self.config.validate()?;

        let report = RunReport::new(commands.len(), self.time_provider.now_millis());
        if commands.is_empty() {
            info!("No commands to run");
            return Ok(self.finish(report));
        }

        info!(
            total = commands.len(),
            max_parallel = self.config.max_parallel,
            cpu_threshold = self.config.cpu_threshold,
            mem_threshold = self.config.mem_threshold,
            backoff_ms = self.config.backoff.as_millis() as u64,
            "Starting batch"
        );

        let mut run = RunState::new(&self.config, report);
        for command in commands {
            self.wait_for_admission(&mut run).await;
            self.launch(&mut run, command);
        }

        let report = self.join_all(run).await;
        Ok(self.finish(report))
    }

    /// Block until the gate admits one more worker
    async fn wait_for_admission(&self, run: &mut RunState) {
        loop {
            self.reap(run);
            let active = run.active();

            let decision = match run.gate.check_capacity(active) {
                Some(reason) => AdmissionDecision::Deny(reason),
                None => {
                    let sample = self.system_probe.sample().await;
                    if let LoadSample::Unavailable { reason } = &sample {
                        warn!(reason = %reason, "System load sample unavailable");
                    }
                    run.gate.decide(active, &sample)
                }
            };

            match decision {
                AdmissionDecision::Admit => return,
                AdmissionDecision::Deny(reason) => {
                    debug!(
                        active,
                        reason = %reason,
                        backoff_ms = self.config.backoff.as_millis() as u64,
                        "Admission deferred"
                    );
                    self.observer.on_deferred(&reason);
                    sleep(self.config.backoff).await;
                }
            }
        }
    }

    /// Spawn a worker for an admitted command
    fn launch(&self, run: &mut RunState, command: Command) {
        let worker_id = run.next_worker_id;
        run.next_worker_id += 1;
        run.pending.insert(worker_id, command.clone());

        let active = run.active();
        run.report.observe_active(active);
        info!(index = command.index(), active, command = %command, "Command admitted");
        self.observer.on_admitted(&command, active);

        let executor = Arc::clone(&self.task_executor);
        let time_provider = Arc::clone(&self.time_provider);
        let outcome_tx = run.outcome_tx.clone();
        run.workers.spawn(async move {
            let outcome = run_worker(command, executor, time_provider).await;
            // The receiver outlives every worker (dropped after join-all)
            let _ = outcome_tx.send((worker_id, outcome));
        });
    }

    /// Non-blocking: fold in every outcome that has already arrived
    fn reap(&self, run: &mut RunState) {
        while let Ok((worker_id, outcome)) = run.outcome_rx.try_recv() {
            self.record(&mut run.report, &mut run.pending, worker_id, outcome);
        }
    }

    /// Join barrier: wait for every outstanding worker
    async fn join_all(&self, run: RunState) -> RunReport {
        let RunState {
            mut report,
            mut pending,
            mut workers,
            outcome_tx,
            mut outcome_rx,
            ..
        } = run;
        drop(outcome_tx);

        info!(outstanding = pending.len(), "All commands admitted, waiting for workers");
        while !pending.is_empty() {
            match outcome_rx.recv().await {
                Some((worker_id, outcome)) => {
                    self.record(&mut report, &mut pending, worker_id, outcome)
                }
                None => break,
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(join_err) = joined {
                error!(error = %join_err, "Worker task ended abnormally");
            }
        }

        // A worker that died without reporting still owes an outcome
        let mut orphaned: Vec<(WorkerId, Command)> = pending.drain().collect();
        orphaned.sort_by_key(|(worker_id, _)| *worker_id);
        for (_, command) in orphaned {
            error!(index = command.index(), command = %command, "Worker exited without reporting an outcome");
            let outcome = CommandOutcome {
                index: command.index(),
                command: command.as_str().to_string(),
                status: OutcomeStatus::Panicked {
                    message: "worker exited without reporting an outcome".to_string(),
                },
                duration_ms: 0,
                stdout: None,
                stderr: None,
            };
            self.observer.on_finished(&outcome);
            report.record(outcome);
        }

        report
    }

    fn record(
        &self,
        report: &mut RunReport,
        pending: &mut HashMap<WorkerId, Command>,
        worker_id: WorkerId,
        outcome: CommandOutcome,
    ) {
        if pending.remove(&worker_id).is_none() {
            warn!(worker_id, "Ignoring outcome from unknown worker");
            return;
        }

        if outcome.is_success() {
            debug!(
                index = outcome.index,
                duration_ms = outcome.duration_ms,
                "Command succeeded"
            );
        } else {
            warn!(
                index = outcome.index,
                command = %outcome.command,
                status = %outcome.status.label(),
                "Command failed"
            );
        }

        self.observer.on_finished(&outcome);
        report.record(outcome);
    }

    fn finish(&self, mut report: RunReport) -> RunReport {
        report.finalize(self.time_provider.now_millis());
        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            peak_active = report.peak_active,
            elapsed_ms = ?report.elapsed_ms(),
            "Batch finished"
        );
        report
    }
}

/// Body of one worker: execute with panic isolation, then classify
async fn run_worker(
    command: Command,
    executor: Arc<dyn TaskExecutor>,
    time_provider: Arc<dyn TimeProvider>,
) -> CommandOutcome {
    let started_ms = time_provider.now_millis();
    let exec_command = command.clone();
    let guarded =
        execute_guarded_async(async move { executor.execute(&exec_command).await }).await;
    let elapsed_ms = time_provider.elapsed_since(started_ms);

    build_outcome(&command, guarded, elapsed_ms)
}

fn build_outcome(
    command: &Command,
    guarded: PanicGuardResult<std::result::Result<ExecutionResult, ExecutionError>>,
    elapsed_ms: i64,
) -> CommandOutcome {
    let mut outcome = CommandOutcome {
        index: command.index(),
        command: command.as_str().to_string(),
        status: OutcomeStatus::Succeeded,
        duration_ms: elapsed_ms,
        stdout: None,
        stderr: None,
    };

    match guarded {
        PanicGuardResult::Success(Ok(result)) => {
            outcome.duration_ms = result.duration_ms;
            let unsuccessful = match result.status {
                ExecutionStatus::Success => None,
                ExecutionStatus::Failed => Some(OutcomeStatus::Failed {
                    exit_code: result.exit_code,
                }),
                ExecutionStatus::TimedOut { after_ms } => {
                    Some(OutcomeStatus::TimedOut { after_ms })
                }
            };
            // Output is only kept for commands that did not succeed
            if let Some(status) = unsuccessful {
                outcome.status = status;
                outcome.stdout = result.stdout.map(|s| tail_utf8(s, STDERR_TAIL_BYTES));
                outcome.stderr = result.stderr.map(|s| tail_utf8(s, STDERR_TAIL_BYTES));
            }
        }
        PanicGuardResult::Success(Err(ExecutionError::Killed(reason))) => {
            outcome.status = OutcomeStatus::Failed { exit_code: None };
            outcome.stderr = Some(reason);
        }
        PanicGuardResult::Success(Err(err)) => {
            outcome.status = OutcomeStatus::LaunchFailed {
                reason: err.to_string(),
            };
        }
        PanicGuardResult::Panicked(message) => {
            outcome.status = OutcomeStatus::Panicked { message };
        }
    }

    outcome
}

/// Keep the last `max_bytes` of captured output (on a char boundary)
fn tail_utf8(text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &text[start..])
}
