//! Batchrun - run a file of shell commands with load-aware parallelism
//!
//! Each non-blank line of the command file is one command. Commands start in
//! file order while a worker slot is free and CPU/memory usage stay below the
//! thresholds; the run ends once every command has finished.

mod console;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use batchrun_core::application::dispatcher::constants::{
    DEFAULT_BACKOFF_MS, DEFAULT_CPU_SAMPLE_WINDOW_MS, DEFAULT_CPU_THRESHOLD, DEFAULT_MAX_PARALLEL,
    DEFAULT_MEM_THRESHOLD, DEFAULT_UNAVAILABLE_FALLBACK_AFTER,
};
use batchrun_core::application::{Dispatcher, DispatcherConfig};
use batchrun_core::port::time_provider::SystemTimeProvider;
use batchrun_infra_system::{read_command_file, ShellExecutor, SystemProbeImpl};

use console::{print_summary, ConsoleObserver};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit code when --fail-on-error is set and at least one command failed
const EXIT_COMMANDS_FAILED: u8 = 2;

/// Exit code after Ctrl-C (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "batchrun")]
#[command(about = "Run shell commands from a file in parallel, throttled by CPU and memory load")]
#[command(version)]
struct Cli {
    /// Path to the command file (one shell command per line)
    path: String,

    /// Maximum number of commands running at once
    #[arg(short = 'j', long, env = "BATCHRUN_MAX_PARALLEL", default_value_t = DEFAULT_MAX_PARALLEL)]
    max_parallel: usize,

    /// Start new commands only while CPU usage is below this percentage
    #[arg(long, env = "BATCHRUN_CPU_THRESHOLD", default_value_t = DEFAULT_CPU_THRESHOLD)]
    cpu_threshold: f32,

    /// Start new commands only while memory usage is below this percentage
    #[arg(long, env = "BATCHRUN_MEM_THRESHOLD", default_value_t = DEFAULT_MEM_THRESHOLD)]
    mem_threshold: f32,

    /// Wait between admission attempts when the system is busy (ms)
    #[arg(long, env = "BATCHRUN_BACKOFF_MS", default_value_t = DEFAULT_BACKOFF_MS)]
    backoff_ms: u64,

    /// CPU observation window per load sample (ms)
    #[arg(long, env = "BATCHRUN_SAMPLE_WINDOW_MS", default_value_t = DEFAULT_CPU_SAMPLE_WINDOW_MS)]
    sample_window_ms: u64,

    /// Consecutive failed load samples before running at half parallelism (0 = never)
    #[arg(long, env = "BATCHRUN_FALLBACK_AFTER", default_value_t = DEFAULT_UNAVAILABLE_FALLBACK_AFTER)]
    fallback_after: u32,

    /// Terminate any command running longer than this (seconds)
    #[arg(long, env = "BATCHRUN_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Exit with status 2 when any command failed
    #[arg(long)]
    fail_on_error: bool,

    /// Print the run report as JSON after the summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            max_parallel: self.max_parallel,
            cpu_threshold: self.cpu_threshold,
            mem_threshold: self.mem_threshold,
            backoff: Duration::from_millis(self.backoff_ms),
            unavailable_fallback_after: self.fallback_after,
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    // 1. Validate configuration before touching the command file
    let config = cli.dispatcher_config();
    config.validate().context("Invalid configuration")?;

    // 2. Load commands
    let path = shellexpand::tilde(&cli.path).into_owned();
    let commands = read_command_file(&path)?;
    info!(path = %path, commands = commands.len(), "Commands loaded");

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let system_probe = Arc::new(SystemProbeImpl::new(Duration::from_millis(
        cli.sample_window_ms,
    )));
    let task_executor = Arc::new(
        ShellExecutor::new(time_provider.clone())
            .with_timeout(cli.timeout_secs.map(Duration::from_secs)),
    );

    let dispatcher = Dispatcher::new(config, system_probe, task_executor, time_provider)
        .with_observer(Arc::new(ConsoleObserver));

    // 4. Run the batch (join-all happens inside). On Ctrl-C we return early;
    // shutting down the runtime drops every worker and kills its child.
    let report = tokio::select! {
        biased;
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            warn!("Interrupted, terminating running commands");
            eprintln!("{}", "Interrupted, running commands terminated".yellow());
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
        report = dispatcher.run(commands) => report?,
    };

    // 5. Report
    print_summary(&report);
    if cli.json {
        println!("{}", report.to_json_pretty()?);
    }

    if cli.fail_on_error && report.failed > 0 {
        return Ok(ExitCode::from(EXIT_COMMANDS_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _log_guard = telemetry::init_logging();
    let cli = Cli::parse();

    info!("batchrun v{} starting", VERSION);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
