// Output Sink Port
// Passthrough display of child output and classification status lines

use crate::domain::{ClassificationEvent, StreamSource};

/// Output sink interface
///
/// Called concurrently from both stream classifiers, so implementations
/// must be thread-safe.
pub trait OutputSink: Send + Sync {
    /// Display one line of child output (without its line terminator)
    fn line(&self, source: StreamSource, line: &str);

    /// Display the human-readable status for a classification
    fn signal(&self, event: &ClassificationEvent);
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::SignalKind;
    use std::sync::Mutex;

    /// Sink that records everything it receives
    #[derive(Default)]
    pub struct RecordingSink {
        lines: Mutex<Vec<(StreamSource, String)>>,
        signals: Mutex<Vec<SignalKind>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn lines(&self) -> Vec<(StreamSource, String)> {
            self.lines.lock().unwrap().clone()
        }

        pub fn lines_from(&self, source: StreamSource) -> Vec<String> {
            self.lines
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, _)| *s == source)
                .map(|(_, line)| line.clone())
                .collect()
        }

        pub fn signals(&self) -> Vec<SignalKind> {
            self.signals.lock().unwrap().clone()
        }
    }

    impl OutputSink for RecordingSink {
        fn line(&self, source: StreamSource, line: &str) {
            self.lines.lock().unwrap().push((source, line.to_string()));
        }

        fn signal(&self, event: &ClassificationEvent) {
            self.signals.lock().unwrap().push(event.signal);
        }
    }
}
