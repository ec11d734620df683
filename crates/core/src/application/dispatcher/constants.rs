// Dispatcher constants (No magic values)
use std::time::Duration;

/// Maximum number of concurrently running commands
pub const DEFAULT_MAX_PARALLEL: usize = 5;

/// CPU usage at or above which admission is denied (percent)
pub const DEFAULT_CPU_THRESHOLD: f32 = 70.0;

/// Memory usage at or above which admission is denied (percent)
pub const DEFAULT_MEM_THRESHOLD: f32 = 70.0;

/// Wait between denied admission attempts (ms)
pub const DEFAULT_BACKOFF_MS: u64 = 2_000;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(DEFAULT_BACKOFF_MS);

/// CPU observation window for one load sample (ms)
pub const DEFAULT_CPU_SAMPLE_WINDOW_MS: u64 = 1_000;

/// Consecutive unavailable samples before switching to "load unknown" mode
/// (0 disables the fallback)
pub const DEFAULT_UNAVAILABLE_FALLBACK_AFTER: u32 = 5;

/// Grace period between SIGTERM and SIGKILL when a command times out (5s)
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Captured stderr kept per failed command (tail, in bytes)
pub const STDERR_TAIL_BYTES: usize = 16 * 1024;
