//! Console presentation: progress lines, failure diagnostics, final summary

use colored::Colorize;
use tabled::{Table, Tabled};

use batchrun_core::domain::{Command, CommandOutcome, RunReport};
use batchrun_core::port::RunObserver;

const TABLE_COMMAND_WIDTH: usize = 60;

/// Prints progress to stdout and failures to stderr as they happen
pub struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn on_admitted(&self, command: &Command, active: usize) {
        println!("started: {}", command);
        println!("active count: {}", active);
    }

    fn on_finished(&self, outcome: &CommandOutcome) {
        if outcome.is_success() {
            return;
        }
        eprintln!(
            "{} ({}): {}",
            "✗ Command failed".red().bold(),
            outcome.status.label(),
            outcome.command
        );
        if let Some(stderr) = outcome
            .stderr
            .as_deref()
            .map(str::trim_end)
            .filter(|s| !s.is_empty())
        {
            eprintln!("{}", stderr);
        }
    }
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "#")]
    line: usize,
    command: String,
    status: String,
}

impl FailureRow {
    fn from_outcome(outcome: &CommandOutcome) -> Self {
        Self {
            line: outcome.index + 1,
            command: shorten(&outcome.command, TABLE_COMMAND_WIDTH),
            status: outcome.status.label(),
        }
    }
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", head)
}

/// Final summary: completion line on stdout, failure table on stderr
pub fn print_summary(report: &RunReport) {
    println!("{} commands completed", report.resolved());

    let failed = if report.failed > 0 {
        report.failed.to_string().red().bold()
    } else {
        report.failed.to_string().green()
    };
    println!(
        "succeeded: {}, failed: {}",
        report.succeeded.to_string().green(),
        failed
    );

    if !report.failures.is_empty() {
        let rows: Vec<FailureRow> = report.failures.iter().map(FailureRow::from_outcome).collect();
        eprintln!();
        eprintln!("{}", "Failed commands".red().bold());
        eprintln!("{}", Table::new(rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchrun_core::domain::OutcomeStatus;

    #[test]
    fn test_shorten_long_command() {
        let long = "x".repeat(100);
        let short = shorten(&long, 10);
        assert_eq!(short.chars().count(), 10);
        assert!(short.ends_with('…'));
        assert_eq!(shorten("ls", 10), "ls");
    }

    #[test]
    fn test_failure_row_is_one_based() {
        let outcome = CommandOutcome {
            index: 0,
            command: "false".to_string(),
            status: OutcomeStatus::Failed { exit_code: Some(1) },
            duration_ms: 1,
            stdout: None,
            stderr: None,
        };
        let row = FailureRow::from_outcome(&outcome);
        assert_eq!(row.line, 1);
        assert_eq!(row.status, "exit code 1");
    }
}
