//! UseCase layer.
//!
//! - `route_frame`: what the read pump does with one inbound frame
//! - `get_presence`: presence snapshot of a tenant
//! - `publish_event`: domain events pushed by other services

pub mod error;
pub mod get_presence;
pub mod publish_event;
pub mod route_frame;

pub use get_presence::{GetPresenceUseCase, PresenceSnapshot};
pub use error::PublishError;
pub use publish_event::PublishEventUseCase;
pub use route_frame::{InboundAction, error_reply, route_inbound_frame};
