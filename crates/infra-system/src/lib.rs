// Batchrun Infrastructure - System Adapters
// Implements: SystemProbe, TaskExecutor, command file source

pub mod command_file;
pub mod shell_executor;
pub mod system_probe_impl;

pub use command_file::read_command_file;
pub use shell_executor::ShellExecutor;
pub use system_probe_impl::SystemProbeImpl;
