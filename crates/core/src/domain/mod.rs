// Domain Layer - Pure business logic and entities

pub mod classification;
pub mod command;
pub mod error;
pub mod run;

// Re-exports
pub use classification::{
    classify, ClassificationEvent, ClassificationRule, SignalKind, StreamSource,
    CLASSIFICATION_RULES,
};
pub use command::Command;
pub use error::DomainError;
pub use run::{ExitStatus, ObservedSignals, RunId, RunOutcome, RunResult, SupervisorState};
