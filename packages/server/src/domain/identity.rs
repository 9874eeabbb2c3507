//! Authenticated connection identity.

use super::{TenantId, UserId};

/// Identity snapshot taken when a connection is admitted.
///
/// Role or tenant changes made afterwards are only seen after a reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub user_name: String,
    pub tenant_id: TenantId,
    pub role: String,
}

impl Identity {
    pub fn new(
        user_id: UserId,
        user_name: impl Into<String>,
        tenant_id: TenantId,
        role: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            tenant_id,
            role: role.into(),
        }
    }
}

/// Public view of one live connection, as listed by presence queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub user_id: UserId,
    pub user_name: String,
    pub role: String,
    /// Unix timestamp (seconds)
    pub connected_at: i64,
}
