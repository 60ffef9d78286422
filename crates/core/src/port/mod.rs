// Port Layer - Interfaces for external dependencies

pub mod command_source;
pub mod id_provider; // For deterministic testing
pub mod output_sink;
pub mod process_launcher;
pub mod time_provider;

// Re-exports
pub use command_source::CommandSource;
pub use id_provider::IdProvider;
pub use output_sink::OutputSink;
pub use process_launcher::{
    OutputStream, ProcessError, ProcessLauncher, ProcessStreams, RunningProcess, SpawnedProcess,
};
pub use time_provider::TimeProvider;
