// System resource monitoring port
// reason: async-trait, sampling blocks for an observation window
use async_trait::async_trait;

use crate::domain::LoadSample;

/// System probe port for admission decisions
///
/// Implementations must not fail: a measurement problem is reported as
/// `LoadSample::Unavailable`, which the dispatcher treats as "busy".
/// Implementations backed by global sampling state must serialize calls.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Take a fresh load sample
    ///
    /// # Example
    /// ```text
    /// match probe.sample().await {
    ///     LoadSample::Measured { cpu_percent, .. } if cpu_percent >= 70.0 => { /* back off */ }
    ///     LoadSample::Unavailable { reason } => { /* deny, log reason */ }
    ///     _ => { /* admit */ }
    /// }
    /// ```
    async fn sample(&self) -> LoadSample;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock SystemProbe for testing
    ///
    /// Returns scripted samples first (in order), then the steady sample.
    pub struct MockSystemProbe {
        script: Mutex<VecDeque<LoadSample>>,
        steady: Mutex<LoadSample>,
        calls: AtomicUsize,
    }

    impl MockSystemProbe {
        pub fn new(cpu_percent: f32, mem_percent: f32) -> Self {
            Self::scripted(Vec::new(), LoadSample::measured(cpu_percent, mem_percent))
        }

        pub fn low_load() -> Self {
            Self::new(10.0, 20.0)
        }

        pub fn unavailable() -> Self {
            Self::scripted(Vec::new(), LoadSample::unavailable("mock probe offline"))
        }

        pub fn scripted(samples: Vec<LoadSample>, then: LoadSample) -> Self {
            Self {
                script: Mutex::new(samples.into()),
                steady: Mutex::new(then),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn set_sample(&self, sample: LoadSample) {
            *self.steady.lock().unwrap() = sample;
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SystemProbe for MockSystemProbe {
        async fn sample(&self) -> LoadSample {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(next) = self.script.lock().unwrap().pop_front() {
                return next;
            }
            self.steady.lock().unwrap().clone()
        }
    }
}
