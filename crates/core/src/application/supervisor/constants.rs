// Supervisor constants (ADR: No magic values)

/// Capacity of the classifier -> supervisor event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Initial capacity of a classifier's line buffer (bytes)
pub const LINE_BUFFER_CAPACITY: usize = 256;
