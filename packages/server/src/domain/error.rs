//! Domain error types.

use thiserror::Error;

use super::MessageType;

/// Failure to offer a frame to a bounded queue without blocking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// The queue is at capacity; the consumer is considered stalled
    #[error("queue is full")]
    Full,

    /// The queue was closed by teardown
    #[error("queue is closed")]
    Closed,
}

/// Inbound frame rejected by the read pump
#[derive(Debug, Error)]
pub enum FrameError {
    /// The frame is not a valid message envelope
    #[error("invalid message format: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame uses a type only the hub may originate
    #[error("message type '{0}' cannot be sent by clients")]
    ReservedType(MessageType),
}
