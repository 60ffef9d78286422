// GpuWatch Infrastructure - System Adapters
// Implements: ProcessLauncher, CommandSource, OutputSink (ADR-002)

pub mod command_source;
pub mod console_sink;
pub mod process_launcher;

pub use command_source::{ArgsSource, NumberedFileSource};
pub use console_sink::ConsoleSink;
pub use process_launcher::{LauncherConfig, TokioProcessLauncher};
