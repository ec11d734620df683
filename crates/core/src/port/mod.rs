// Port Layer - Interfaces for external dependencies

pub mod run_observer;
pub mod system_probe;
pub mod task_executor;
pub mod time_provider; // For deterministic testing

// Re-exports
pub use run_observer::{NoopObserver, RunObserver};
pub use system_probe::SystemProbe;
pub use task_executor::{ExecutionError, ExecutionResult, ExecutionStatus, TaskExecutor};
pub use time_provider::TimeProvider;
