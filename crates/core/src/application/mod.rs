// Application Layer - Admission-controlled batch dispatch

pub mod dispatcher;

// Re-exports
pub use dispatcher::{AdmissionDecision, AdmissionGate, DenyReason, Dispatcher, DispatcherConfig};
