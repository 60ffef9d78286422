// Classification Domain Model
// Declarative rule table for backend diagnostics

use serde::{Deserialize, Serialize};

/// Kind of backend signal recognised in a line of output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    /// The command runs on the preferred (GPU) backend
    CapableBackendConfirmed,
    /// The command fell back to software emulation
    DegradedBackendDetected,
}

impl SignalKind {
    /// Whether this signal requires the command to be stopped
    pub fn requires_termination(&self) -> bool {
        matches!(self, SignalKind::DegradedBackendDetected)
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::CapableBackendConfirmed => write!(f, "CAPABLE_BACKEND_CONFIRMED"),
            SignalKind::DegradedBackendDetected => write!(f, "DEGRADED_BACKEND_DETECTED"),
        }
    }
}

/// Which output stream of the child a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamSource::Stdout => write!(f, "stdout"),
            StreamSource::Stderr => write!(f, "stderr"),
        }
    }
}

/// A substring pattern mapped to the signal it indicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationRule {
    pub pattern: &'static str,
    pub signal: SignalKind,
}

impl ClassificationRule {
    pub const fn new(pattern: &'static str, signal: SignalKind) -> Self {
        Self { pattern, signal }
    }

    /// Case-sensitive substring match
    pub fn matches(&self, line: &str) -> bool {
        line.contains(self.pattern)
    }
}

/// Ordered rule table, first match wins
pub const CLASSIFICATION_RULES: &[ClassificationRule] = &[
    ClassificationRule::new("FINISHME:", SignalKind::CapableBackendConfirmed),
    ClassificationRule::new(
        "lavapipe is not a conformant vulkan implementation",
        SignalKind::DegradedBackendDetected,
    ),
];

/// Classify a line against an ordered rule table
///
/// Returns the signal of the first matching rule, or `None`.
pub fn classify(rules: &[ClassificationRule], line: &str) -> Option<SignalKind> {
    rules
        .iter()
        .find(|rule| rule.matches(line))
        .map(|rule| rule.signal)
}

/// Emitted by a StreamClassifier when a line matches a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationEvent {
    pub signal: SignalKind,
    pub source: StreamSource,
    pub line: String,
}
