//! Ports implemented by the hub.
//!
//! Use cases depend on these traits only, never on `Hub` itself, so they can be
//! tested against mocks.

use async_trait::async_trait;
use serde_json::Value;

use super::{ConnectionInfo, MessageType, TenantId, UserId};

/// Producer surface: fire-and-forget event delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPusher: Send + Sync {
    /// Queue a message for every connection of the tenant.
    ///
    /// Dropped with a warning when the tenant has no room.
    async fn broadcast_to_tenant(
        &self,
        tenant_id: TenantId,
        kind: MessageType,
        payload: Option<Value>,
    );

    /// Deliver directly to every connection of one user within the tenant.
    ///
    /// Not ordered relative to messages flowing through the room queue.
    async fn broadcast_to_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        kind: MessageType,
        payload: Option<Value>,
    );
}

/// Query surface: in-memory presence snapshot at call time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PresenceRepository: Send + Sync {
    /// Users with at least one live connection, de-duplicated by user
    async fn online_users(&self, tenant_id: TenantId) -> Vec<UserId>;

    /// Raw connection count
    async fn client_count(&self, tenant_id: TenantId) -> usize;

    /// One entry per live connection
    async fn connections(&self, tenant_id: TenantId) -> Vec<ConnectionInfo>;
}
