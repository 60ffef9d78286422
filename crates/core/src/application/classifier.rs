// Stream Classifier - line reader for one child output stream

use crate::application::supervisor::constants::LINE_BUFFER_CAPACITY;
use crate::domain::{
    classify, ClassificationEvent, ClassificationRule, StreamSource, CLASSIFICATION_RULES,
};
use crate::port::OutputSink;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// What a classifier saw before its stream closed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierStats {
    pub lines: usize,
    pub events: usize,
    /// A final line without terminator was dropped
    pub partial_line_discarded: bool,
}

/// Reads one stream line by line, passes lines through and reports matches
///
/// Owns only its stream and the event sender. It never touches the process,
/// so termination stays with the supervisor.
pub struct StreamClassifier {
    source: StreamSource,
    rules: &'static [ClassificationRule],
    sink: Arc<dyn OutputSink>,
    events: mpsc::Sender<ClassificationEvent>,
}

impl StreamClassifier {
    pub fn new(
        source: StreamSource,
        sink: Arc<dyn OutputSink>,
        events: mpsc::Sender<ClassificationEvent>,
    ) -> Self {
        Self {
            source,
            rules: CLASSIFICATION_RULES,
            sink,
            events,
        }
    }

    /// Replace the rule table (tests)
    pub fn with_rules(mut self, rules: &'static [ClassificationRule]) -> Self {
        self.rules = rules;
        self
    }

    /// Consume the stream until EOF or a read error
    ///
    /// Neither EOF nor a read error is reported as a failure: the child
    /// exiting and closing its pipe is how this loop normally ends.
    pub async fn run<R>(self, stream: R) -> ClassifierStats
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(LINE_BUFFER_CAPACITY);
        let mut stats = ClassifierStats::default();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!(source = %self.source, "Stream closed");
                    break;
                }
                Ok(_) if buf.last() != Some(&b'\n') => {
                    debug!(
                        source = %self.source,
                        bytes = buf.len(),
                        "Discarding unterminated line at end of stream"
                    );
                    stats.partial_line_discarded = true;
                    break;
                }
                Ok(_) => {
                    let line = decode_line(&buf);
                    self.handle_line(&line, &mut stats).await;
                }
                Err(e) => {
                    debug!(source = %self.source, error = %e, "Stream read failed, stopping");
                    break;
                }
            }
        }

        debug!(
            source = %self.source,
            lines = stats.lines,
            events = stats.events,
            "Classifier finished"
        );
        stats
    }

    async fn handle_line(&self, line: &str, stats: &mut ClassifierStats) {
        stats.lines += 1;
        self.sink.line(self.source, line);

        let Some(signal) = classify(self.rules, line) else {
            return;
        };

        stats.events += 1;
        let event = ClassificationEvent {
            signal,
            source: self.source,
            line: line.to_string(),
        };

        // Keep draining even if nobody listens, so the child never blocks on a full pipe
        if self.events.send(event).await.is_err() {
            debug!(source = %self.source, signal = %signal, "Event receiver dropped");
        }
    }
}

/// Strip the line terminator and decode lossily
fn decode_line(buf: &[u8]) -> String {
    let mut end = buf.len();
    if end > 0 && buf[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && buf[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&buf[..end]).into_owned()
}
