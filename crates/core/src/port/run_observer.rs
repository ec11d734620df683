// Run observer port - progress notifications from the dispatcher loop

use crate::application::dispatcher::DenyReason;
use crate::domain::{Command, CommandOutcome};

/// Receives progress events for one batch
///
/// All callbacks are invoked from the dispatcher's own sequential loop, in
/// event order, so implementations need no ordering logic of their own.
pub trait RunObserver: Send + Sync {
    /// A command was admitted; `active` includes the new worker
    fn on_admitted(&self, _command: &Command, _active: usize) {}

    /// Admission was denied and the dispatcher is about to back off
    fn on_deferred(&self, _reason: &DenyReason) {}

    /// A worker finished and its outcome was recorded
    fn on_finished(&self, _outcome: &CommandOutcome) {}
}

/// Observer that ignores every event
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Recorded observer event
    #[derive(Debug, Clone, PartialEq)]
    pub enum ObservedEvent {
        Admitted { command: String, active: usize },
        Deferred(DenyReason),
        Finished(CommandOutcome),
    }

    /// Observer that keeps every event for later assertions
    #[derive(Default)]
    pub struct RecordingObserver {
        events: Mutex<Vec<ObservedEvent>>,
    }

    impl RecordingObserver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<ObservedEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn admitted(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    ObservedEvent::Admitted { command, .. } => Some(command),
                    _ => None,
                })
                .collect()
        }

        pub fn finished(&self) -> Vec<CommandOutcome> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    ObservedEvent::Finished(outcome) => Some(outcome),
                    _ => None,
                })
                .collect()
        }

        pub fn deferrals(&self) -> usize {
            self.events()
                .iter()
                .filter(|event| matches!(event, ObservedEvent::Deferred(_)))
                .count()
        }
    }

    impl RunObserver for RecordingObserver {
        fn on_admitted(&self, command: &Command, active: usize) {
            self.events.lock().unwrap().push(ObservedEvent::Admitted {
                command: command.as_str().to_string(),
                active,
            });
        }

        fn on_deferred(&self, reason: &DenyReason) {
            self.events
                .lock()
                .unwrap()
                .push(ObservedEvent::Deferred(reason.clone()));
        }

        fn on_finished(&self, outcome: &CommandOutcome) {
            self.events
                .lock()
                .unwrap()
                .push(ObservedEvent::Finished(outcome.clone()));
        }
    }
}
