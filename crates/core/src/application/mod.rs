// Application Layer - Use Cases and Business Logic

pub mod classifier;
pub mod supervisor;

// Re-exports
pub use classifier::{ClassifierStats, StreamClassifier};
pub use supervisor::{Supervisor, SupervisorConfig, TerminationGuard};
