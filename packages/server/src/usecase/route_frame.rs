//! UseCase: 受信フレームのルーティング
//!
//! A connection can only ever speak as itself: the addressing fields of the raw
//! frame are discarded and the connection's authenticated user and tenant, a
//! fresh timestamp and a fresh message id are stamped instead.

use serde_json::json;

use crate::{
    domain::{FrameError, Identity, Message, MessageType},
    infrastructure::dto::websocket::InboundFrame,
};

/// What the read pump must do with a parsed frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundAction {
    /// Enqueue on the sender's own outbound queue only
    Reply(Message),
    /// Hand to the hub's central broadcast queue
    Broadcast(Message),
}

/// Parse and re-stamp one inbound text frame.
///
/// # Errors
///
/// * `FrameError::Malformed` - not a valid envelope (bad JSON, unknown type)
/// * `FrameError::ReservedType` - a presence event, which only the hub emits
pub fn route_inbound_frame(
    identity: &Identity,
    raw: &str,
    now: i64,
) -> Result<InboundAction, FrameError> {
    let frame: InboundFrame = serde_json::from_str(raw.trim())?;

    if frame.r#type.is_hub_originated() {
        return Err(FrameError::ReservedType(frame.r#type));
    }

    let action = match frame.r#type {
        MessageType::Ping => InboundAction::Reply(
            Message::new(MessageType::Pong, identity.tenant_id, now).with_origin(identity.user_id),
        ),
        // typing and the rest: every member of the tenant sees it, including
        // the sender's other devices
        _ => InboundAction::Broadcast(stamp(identity, frame, now)),
    };
    Ok(action)
}

/// Error message sent back to the offending connection only
pub fn error_reply(identity: &Identity, error: &FrameError, now: i64) -> Message {
    Message::new(MessageType::Error, identity.tenant_id, now)
        .with_origin(identity.user_id)
        .with_payload(json!({ "error": error.to_string() }))
}

fn stamp(identity: &Identity, frame: InboundFrame, now: i64) -> Message {
    Message::new(frame.r#type, identity.tenant_id, now)
        .with_origin(identity.user_id)
        .with_optional_payload(frame.data)
        .with_meta(frame.meta)
}
