// Domain Layer - Commands, load samples and run outcomes

pub mod command;
pub mod load;
pub mod report;

pub use command::{parse_commands, Command};
pub use load::LoadSample;
pub use report::{CommandOutcome, OutcomeStatus, RunReport};
