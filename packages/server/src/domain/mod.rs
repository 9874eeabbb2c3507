//! Domain layer: identities, the message envelope and the ports the hub fulfils.
//!
//! Nothing in here knows about sockets or tasks. The hub implementation lives in
//! `infrastructure::hub` and implements the traits declared in `pusher`.

pub mod error;
pub mod identity;
pub mod message;
pub mod pusher;
pub mod value_object;

pub use error::{EnqueueError, FrameError};
pub use identity::{ConnectionInfo, Identity};
pub use message::{Message, MessageType, TaskAction};
pub use pusher::{EventPusher, PresenceRepository};
#[cfg(test)]
pub use pusher::{MockEventPusher, MockPresenceRepository};
pub use value_object::{ConnectionId, MessageId, TenantId, UserId};
