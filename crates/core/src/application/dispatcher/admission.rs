// Admission policy - decides whether the next command may start now

use std::fmt;
use tracing::{info, warn};

use super::config::DispatcherConfig;
use crate::domain::LoadSample;

/// Why a command was not admitted
#[derive(Debug, Clone, PartialEq)]
pub enum DenyReason {
    /// Every worker slot is taken
    AtCeiling { active: usize, ceiling: usize },
    CpuBusy { cpu_percent: f32, threshold: f32 },
    MemoryBusy { mem_percent: f32, threshold: f32 },
    /// The probe could not measure load
    LoadUnavailable { reason: String, consecutive: u32 },
    /// Load unknown for too long; only the degraded ceiling applies
    DegradedCeiling { active: usize, ceiling: usize },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::AtCeiling { active, ceiling } => {
                write!(f, "{} of {} workers busy", active, ceiling)
            }
            DenyReason::CpuBusy {
                cpu_percent,
                threshold,
            } => write!(f, "cpu {:.1}% >= {:.1}%", cpu_percent, threshold),
            DenyReason::MemoryBusy {
                mem_percent,
                threshold,
            } => write!(f, "memory {:.1}% >= {:.1}%", mem_percent, threshold),
            DenyReason::LoadUnavailable {
                reason,
                consecutive,
            } => write!(
                f,
                "system load unavailable ({} in a row): {}",
                consecutive, reason
            ),
            DenyReason::DegradedCeiling { active, ceiling } => write!(
                f,
                "load unknown, {} of {} degraded slots busy",
                active, ceiling
            ),
        }
    }
}

/// Admission decision
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    Admit,
    Deny(DenyReason),
}

impl AdmissionDecision {
    pub fn is_admit(&self) -> bool {
        matches!(self, AdmissionDecision::Admit)
    }
}

/// Stateful admission gate for one run
///
/// The only state carried between checks is the count of consecutive
/// unavailable samples, which drives the "load unknown" fallback.
pub struct AdmissionGate {
    ceiling: usize,
    degraded_ceiling: usize,
    cpu_threshold: f32,
    mem_threshold: f32,
    fallback_after: u32,
    consecutive_unavailable: u32,
}

impl AdmissionGate {
    pub fn new(config: &DispatcherConfig) -> Self {
        Self {
            ceiling: config.max_parallel,
            degraded_ceiling: config.degraded_ceiling(),
            cpu_threshold: config.cpu_threshold,
            mem_threshold: config.mem_threshold,
            fallback_after: config.unavailable_fallback_after,
            consecutive_unavailable: 0,
        }
    }

    /// Ceiling check alone; a full ceiling denies without needing a sample
    pub fn check_capacity(&self, active: usize) -> Option<DenyReason> {
        if active >= self.ceiling {
            Some(DenyReason::AtCeiling {
                active,
                ceiling: self.ceiling,
            })
        } else {
            None
        }
    }

    /// True while load has been unavailable long enough to use the degraded ceiling
    pub fn in_fallback(&self) -> bool {
        self.fallback_after > 0 && self.consecutive_unavailable >= self.fallback_after
    }

    /// Full admission decision for the current active count and a fresh sample
    pub fn decide(&mut self, active: usize, sample: &LoadSample) -> AdmissionDecision {
        if let Some(reason) = self.check_capacity(active) {
            return AdmissionDecision::Deny(reason);
        }

        match sample {
            LoadSample::Measured {
                cpu_percent,
                mem_percent,
            } => {
                if self.in_fallback() {
                    info!("System load measurable again, leaving degraded admission");
                }
                self.consecutive_unavailable = 0;

                if *cpu_percent >= self.cpu_threshold {
                    return AdmissionDecision::Deny(DenyReason::CpuBusy {
                        cpu_percent: *cpu_percent,
                        threshold: self.cpu_threshold,
                    });
                }
                if *mem_percent >= self.mem_threshold {
                    return AdmissionDecision::Deny(DenyReason::MemoryBusy {
                        mem_percent: *mem_percent,
                        threshold: self.mem_threshold,
                    });
                }
                AdmissionDecision::Admit
            }
            LoadSample::Unavailable { reason } => {
                self.consecutive_unavailable = self.consecutive_unavailable.saturating_add(1);

                if !self.in_fallback() {
                    return AdmissionDecision::Deny(DenyReason::LoadUnavailable {
                        reason: reason.clone(),
                        consecutive: self.consecutive_unavailable,
                    });
                }
                if self.consecutive_unavailable == self.fallback_after {
                    warn!(
                        consecutive = self.consecutive_unavailable,
                        degraded_ceiling = self.degraded_ceiling,
                        "System load unavailable, admitting up to degraded ceiling"
                    );
                }
                if active < self.degraded_ceiling {
                    AdmissionDecision::Admit
                } else {
                    AdmissionDecision::Deny(DenyReason::DegradedCeiling {
                        active,
                        ceiling: self.degraded_ceiling,
                    })
                }
            }
        }
    }
}
