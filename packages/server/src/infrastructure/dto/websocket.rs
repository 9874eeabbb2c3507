//! WebSocket frame DTOs.
//!
//! One JSON object per WebSocket text message:
//!
//! ```text
//! {"type": "task_update", "data": {...}, "user_id": "<uuid>",
//!  "tenant_id": "<uuid>", "timestamp": 1700000000, "message_id": "<uuid>"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{MessageId, MessageType, TenantId, UserId};

/// Envelope as written to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub r#type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Absent for hub-wide system broadcasts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub tenant_id: TenantId,
    pub timestamp: i64,
    pub message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

/// Envelope as read from clients.
///
/// `user_id`, `tenant_id`, `timestamp` and `message_id` may be present in the
/// raw frame but are never read: the connection's own identity and fresh values
/// are stamped instead.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    pub r#type: MessageType,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub meta: Option<Map<String, Value>>,
}
