// System probe implementation
// reason: sysinfo for cross-platform CPU/memory sampling
use async_trait::async_trait;
use std::time::Duration;
use sysinfo::System;
use tokio::sync::Mutex;
use tracing::debug;

use batchrun_core::domain::LoadSample;
use batchrun_core::port::SystemProbe;

/// System probe implementation using sysinfo
///
/// CPU usage is the delta between two refreshes `sample_window` apart, so the
/// shared `System` is locked for the whole window: concurrent callers queue
/// up instead of resetting each other's baseline.
pub struct SystemProbeImpl {
    system: Mutex<System>,
    sample_window: Duration,
}

impl SystemProbeImpl {
    /// Create a new system probe
    ///
    /// `sample_window` is raised to sysinfo's minimum CPU refresh interval
    /// when shorter.
    ///
    /// # Example
    /// ```ignore
    /// let probe = SystemProbeImpl::new(Duration::from_secs(1));
    /// ```
    pub fn new(sample_window: Duration) -> Self {
        Self {
            system: Mutex::new(System::new()),
            sample_window: sample_window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn sample_window(&self) -> Duration {
        self.sample_window
    }
}

/// Turn raw readings into a sample, or explain why they are unusable
fn classify(cpu_usage: f32, used_memory: u64, total_memory: u64) -> LoadSample {
    if !cpu_usage.is_finite() {
        return LoadSample::unavailable(format!("cpu usage reading is {}", cpu_usage));
    }
    if total_memory == 0 {
        return LoadSample::unavailable("total memory reported as zero");
    }
    let mem_percent = (used_memory as f64 / total_memory as f64 * 100.0) as f32;
    LoadSample::measured(cpu_usage, mem_percent)
}

#[async_trait]
impl SystemProbe for SystemProbeImpl {
    async fn sample(&self) -> LoadSample {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return LoadSample::unavailable("system metrics not supported on this platform");
        }

        let mut sys = self.system.lock().await;

        // Two refreshes bracket the observation window
        sys.refresh_cpu();
        tokio::time::sleep(self.sample_window).await;
        sys.refresh_cpu();
        let cpu_usage = sys.global_cpu_info().cpu_usage();

        sys.refresh_memory();
        let used_memory = sys.used_memory();
        let total_memory = sys.total_memory();

        let sample = classify(cpu_usage, used_memory, total_memory);
        debug!(
            cpu = %cpu_usage,
            mem_used_mb = used_memory / 1024 / 1024,
            mem_total_mb = total_memory / 1024 / 1024,
            window_ms = self.sample_window.as_millis() as u64,
            sample = ?sample,
            "System load sampled"
        );
        sample
    }
}
