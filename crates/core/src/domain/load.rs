// System load sample (CPU %, memory %)

/// Instantaneous system load, or an explicit "could not measure" state
///
/// Samples are taken fresh for every admission check and never cached.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSample {
    Measured { cpu_percent: f32, mem_percent: f32 },
    Unavailable { reason: String },
}

impl LoadSample {
    /// Build a measured sample, clamping both values into [0, 100]
    pub fn measured(cpu_percent: f32, mem_percent: f32) -> Self {
        LoadSample::Measured {
            cpu_percent: clamp_percent(cpu_percent),
            mem_percent: clamp_percent(mem_percent),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        LoadSample::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, LoadSample::Measured { .. })
    }
}

fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        return 100.0;
    }
    value.clamp(0.0, 100.0)
}
