//! Message envelope flowing through every queue of the hub.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{MessageId, TenantId, UserId};

/// Message type tag, snake_case on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    TaskUpdate,
    TaskCreate,
    TaskDelete,
    Notification,
    UserJoined,
    UserLeft,
    Typing,
    Ping,
    Pong,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskUpdate => "task_update",
            Self::TaskCreate => "task_create",
            Self::TaskDelete => "task_delete",
            Self::Notification => "notification",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::Typing => "typing",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error => "error",
        }
    }

    /// Presence events are synthesized by the hub only.
    pub fn is_hub_originated(&self) -> bool {
        matches!(self, Self::UserJoined | Self::UserLeft)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle action of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Created,
    Updated,
    Deleted,
}

impl TaskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// Message envelope.
///
/// Immutable once built: the builder methods consume `self`, and the hub only
/// ever hands out shared references or serialized frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    kind: MessageType,
    payload: Option<Value>,
    origin_user_id: Option<UserId>,
    tenant_id: TenantId,
    timestamp: i64,
    message_id: MessageId,
    meta: Option<Map<String, Value>>,
}

impl Message {
    /// Create a message stamped with `timestamp` and a fresh message id
    pub fn new(kind: MessageType, tenant_id: TenantId, timestamp: i64) -> Self {
        Self {
            kind,
            payload: None,
            origin_user_id: None,
            tenant_id,
            timestamp,
            message_id: MessageId::generate(),
            meta: None,
        }
    }

    pub fn with_origin(mut self, user_id: UserId) -> Self {
        self.origin_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_optional_payload(mut self, payload: Option<Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_meta(mut self, meta: Option<Map<String, Value>>) -> Self {
        self.meta = meta;
        self
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn origin_user_id(&self) -> Option<UserId> {
        self.origin_user_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn meta(&self) -> Option<&Map<String, Value>> {
        self.meta.as_ref()
    }
}
