//! Tenant room: member set of one tenant and its serialized fan-out loop.
//!
//! Each room runs its own loop, so a slow tenant only ever delays itself.
//! Members whose outbound queue is full or closed are closed and dropped on the
//! spot; that is the only backpressure relief the hub has.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::{RwLock, mpsc, mpsc::error::TrySendError};

use crate::{
    domain::{ConnectionId, ConnectionInfo, EnqueueError, Message, TenantId, UserId},
    infrastructure::dto::conversion::encode_frame,
};

use super::connection::{Connection, Frame};

type Members = Arc<RwLock<HashMap<ConnectionId, Arc<Connection>>>>;

pub struct TenantRoom {
    tenant_id: TenantId,
    members: Members,
    queue: mpsc::Sender<Message>,
}

impl TenantRoom {
    /// Create an empty room and spawn its fan-out loop.
    ///
    /// The loop ends once the room is dropped and its queue drained.
    pub fn spawn(tenant_id: TenantId, queue_capacity: usize) -> Arc<Self> {
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let members: Members = Arc::new(RwLock::new(HashMap::new()));
        tokio::spawn(fan_out_loop(tenant_id, members.clone(), rx));
        Arc::new(Self {
            tenant_id,
            members,
            queue,
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Queue a message for fan-out without blocking
    pub fn offer(&self, message: Message) -> Result<(), EnqueueError> {
        self.queue.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    pub(crate) async fn insert(&self, connection: Arc<Connection>) -> usize {
        let mut members = self.members.write().await;
        members.insert(connection.id(), connection);
        members.len()
    }

    pub(crate) async fn remove(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.members.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    /// Distinct users with at least one member connection
    pub async fn online_users(&self) -> Vec<UserId> {
        let members = self.members.read().await;
        let users: HashSet<UserId> = members.values().map(|c| c.user_id()).collect();
        users.into_iter().collect()
    }

    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let members = self.members.read().await;
        members.values().map(|c| c.info()).collect()
    }

    /// Enqueue `frame` on every member connection owned by `user_id`.
    ///
    /// Runs outside the fan-out loop, so it holds the member write lock for the
    /// whole scan. Connections that cannot take the frame are closed and
    /// removed immediately. Returns the number of connections reached.
    pub(crate) async fn send_to_user(&self, user_id: UserId, frame: Frame) -> usize {
        let mut members = self.members.write().await;
        let mut delivered = 0;
        members.retain(|id, connection| {
            if connection.user_id() != user_id {
                return true;
            }
            match connection.try_enqueue(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %id,
                        user_id = %user_id,
                        tenant_id = %self.tenant_id,
                        "Dropping slow client on targeted send: {}",
                        e
                    );
                    connection.close();
                    false
                }
            }
        });
        delivered
    }
}

async fn fan_out_loop(tenant_id: TenantId, members: Members, mut rx: mpsc::Receiver<Message>) {
    tracing::debug!(tenant_id = %tenant_id, "Room fan-out loop started");

    while let Some(message) = rx.recv().await {
        let frame: Frame = match encode_frame(&message) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!(
                    tenant_id = %tenant_id,
                    message_id = %message.message_id(),
                    "Failed to serialize message: {}",
                    e
                );
                continue;
            }
        };
        deliver(tenant_id, &members, frame).await;
    }

    tracing::debug!(tenant_id = %tenant_id, "Room fan-out loop stopped");
}

/// Offer one frame to every member, then drop the members that refused it.
async fn deliver(tenant_id: TenantId, members: &Members, frame: Frame) {
    let dead: Vec<ConnectionId> = {
        let members = members.read().await;
        members
            .iter()
            .filter_map(|(id, connection)| match connection.try_enqueue(frame.clone()) {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %id,
                        user_id = %connection.user_id(),
                        tenant_id = %tenant_id,
                        "Dropping slow client on fan-out: {}",
                        e
                    );
                    connection.close();
                    Some(*id)
                }
            })
            .collect()
    };

    if !dead.is_empty() {
        let mut members = members.write().await;
        for id in dead {
            members.remove(&id);
        }
    }
}
