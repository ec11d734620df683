// Batchrun Core - Domain Logic, Ports & Dispatcher
// NO process or OS-metrics dependencies (hexagonal layout)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;

pub use error::{AppError, Result};
