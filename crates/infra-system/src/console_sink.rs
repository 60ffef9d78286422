// Console output sink
// Child output goes to our stdout; diagnostics stay on stderr via tracing

use colored::Colorize;
use std::io::Write;

use gpuwatch_core::domain::{ClassificationEvent, SignalKind, StreamSource};
use gpuwatch_core::port::OutputSink;

/// Default prefix for passthrough stdout lines
pub const DEFAULT_STDOUT_PREFIX: &str = "1";

/// Prints child output and status lines to the process's stdout
pub struct ConsoleSink {
    stdout_prefix: String,
}

impl ConsoleSink {
    pub fn new(stdout_prefix: impl Into<String>) -> Self {
        Self {
            stdout_prefix: stdout_prefix.into(),
        }
    }

    /// Format one passthrough line (stderr lines are unprefixed)
    pub fn format_line(&self, source: StreamSource, line: &str) -> String {
        match source {
            StreamSource::Stdout => format!("{}{}", self.stdout_prefix, line),
            StreamSource::Stderr => line.to_string(),
        }
    }

    fn write_line(text: &str) {
        // A closed stdout must not take the supervisor down
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", text);
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(DEFAULT_STDOUT_PREFIX)
    }
}

/// Human-readable status for a signal
pub fn status_message(signal: SignalKind) -> &'static str {
    match signal {
        SignalKind::CapableBackendConfirmed => "capable backend confirmed",
        SignalKind::DegradedBackendDetected => "degraded backend detected",
    }
}

impl OutputSink for ConsoleSink {
    fn line(&self, source: StreamSource, line: &str) {
        Self::write_line(&self.format_line(source, line));
    }

    fn signal(&self, event: &ClassificationEvent) {
        let message = status_message(event.signal);
        let styled = match event.signal {
            SignalKind::CapableBackendConfirmed => message.green().bold(),
            SignalKind::DegradedBackendDetected => message.red().bold(),
        };
        Self::write_line(&styled.to_string());
    }
}
