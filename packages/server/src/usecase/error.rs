//! UseCase layer errors.

use thiserror::Error;

use crate::domain::MessageType;

/// Failure to publish an externally produced event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Presence and heartbeat types belong to the hub and the connections
    #[error("message type '{0}' cannot be published")]
    ReservedType(MessageType),
}
