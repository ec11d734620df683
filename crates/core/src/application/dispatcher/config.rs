// Dispatcher configuration

use std::time::Duration;

use super::constants::*;
use crate::error::{AppError, Result};

/// Tunables for one dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Hard ceiling on concurrently active workers
    pub max_parallel: usize,
    /// Admission requires CPU usage strictly below this (percent)
    pub cpu_threshold: f32,
    /// Admission requires memory usage strictly below this (percent)
    pub mem_threshold: f32,
    /// Wait after a denied admission before retrying
    pub backoff: Duration,
    /// Consecutive unavailable samples before admitting up to the degraded
    /// ceiling; 0 keeps denying forever
    pub unavailable_fallback_after: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            cpu_threshold: DEFAULT_CPU_THRESHOLD,
            mem_threshold: DEFAULT_MEM_THRESHOLD,
            backoff: DEFAULT_BACKOFF,
            unavailable_fallback_after: DEFAULT_UNAVAILABLE_FALLBACK_AFTER,
        }
    }
}

impl DispatcherConfig {
    /// Reject settings that would make the admission loop meaningless
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel == 0 {
            return Err(AppError::Config(
                "max parallel commands must be at least 1".to_string(),
            ));
        }
        if self.backoff.is_zero() {
            return Err(AppError::Config(
                "admission backoff must be greater than zero".to_string(),
            ));
        }
        validate_threshold("cpu threshold", self.cpu_threshold)?;
        validate_threshold("memory threshold", self.mem_threshold)?;
        Ok(())
    }

    /// Ceiling used while system load cannot be measured
    pub fn degraded_ceiling(&self) -> usize {
        (self.max_parallel / 2).max(1)
    }
}

fn validate_threshold(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || value <= 0.0 || value > 100.0 {
        return Err(AppError::Config(format!(
            "{} must be in (0, 100], got {}",
            name, value
        )));
    }
    Ok(())
}
