//! HTTP API DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{MessageType, TaskAction, UserId};

/// Presence snapshot of one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceDto {
    pub tenant_id: String,
    pub online_users: Vec<UserId>,
    pub client_count: usize,
    pub user_count: usize,
    pub connections: Vec<ConnectionDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionDto {
    pub user_id: UserId,
    pub user_name: String,
    pub role: String,
    /// RFC 3339, UTC
    pub connected_at: Option<String>,
}

/// Body of `POST /api/tenants/{tenant_id}/events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishEventRequest {
    pub r#type: MessageType,
    #[serde(default)]
    pub data: Option<Value>,
    /// Targets a single user's connections when present
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Body of `POST /api/tenants/{tenant_id}/tasks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEventRequest {
    pub action: TaskAction,
    pub task: Value,
}

/// Body of `POST /api/tenants/{tenant_id}/users/{user_id}/notifications`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub notification: Value,
}
