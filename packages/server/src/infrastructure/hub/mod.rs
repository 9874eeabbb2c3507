//! In-memory connection hub.
//!
//! ## 構成
//!
//! - [`Hub`]: cloneable handle used by the accept handler, the pumps and the
//!   use cases. Implements [`EventPusher`] and [`PresenceRepository`].
//! - [`Dispatcher`]: the single task that drains the register, unregister and
//!   broadcast queues. It is the only writer of the tenant → room map.
//! - [`TenantRoom`]: member set plus fan-out loop, one per tenant with at least
//!   one connection.
//! - [`Connection`]: one live stream with its bounded outbound queue.
//!
//! ## Ordering
//!
//! Messages queued to one room reach its members in queue order. Nothing is
//! ordered across rooms, and targeted sends (`broadcast_to_user`) bypass the
//! room queue, so they may overtake or trail a concurrent room broadcast.
//!
//! Dropping every `Hub` handle stops the dispatcher, which drops the rooms and
//! lets their loops finish. Queued messages are not drained on shutdown.

pub mod connection;
pub mod room;

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use hiroba_shared::time::Clock;
use serde_json::{Value, json};
use tokio::{
    sync::{RwLock, mpsc, mpsc::error::TrySendError},
    task::JoinHandle,
};

use crate::{
    config::HubConfig,
    domain::{
        ConnectionInfo, EventPusher, Identity, Message, MessageType, PresenceRepository, TenantId,
        UserId,
    },
    infrastructure::dto::conversion::encode_frame,
};

pub use connection::{Connection, ConnectionMeta, ConnectionState, Frame, OutboundReceiver};
pub use room::TenantRoom;

type Rooms = RwLock<HashMap<TenantId, Arc<TenantRoom>>>;

/// State shared by every hub handle and the dispatcher
struct Registry {
    rooms: Rooms,
    config: HubConfig,
    clock: Arc<dyn Clock>,
}

/// Handle to a running hub.
///
/// Cheap to clone; every clone feeds the same dispatcher.
#[derive(Clone)]
pub struct Hub {
    registry: Arc<Registry>,
    register_tx: mpsc::UnboundedSender<Arc<Connection>>,
    unregister_tx: mpsc::UnboundedSender<Arc<Connection>>,
    broadcast_tx: mpsc::Sender<Message>,
}

impl Hub {
    /// Build a hub and the dispatcher that must be run for it to make progress.
    pub fn new(config: HubConfig, clock: Arc<dyn Clock>) -> (Self, Dispatcher) {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.hub_queue_capacity.max(1));

        let registry = Arc::new(Registry {
            rooms: RwLock::new(HashMap::new()),
            config,
            clock,
        });

        let hub = Self {
            registry: registry.clone(),
            register_tx,
            unregister_tx,
            broadcast_tx,
        };
        let dispatcher = Dispatcher {
            registry,
            register_rx,
            unregister_rx,
            broadcast_rx,
        };
        (hub, dispatcher)
    }

    /// Build a hub and spawn its dispatcher on the current runtime
    pub fn spawn(config: HubConfig, clock: Arc<dyn Clock>) -> (Self, JoinHandle<()>) {
        let (hub, dispatcher) = Self::new(config, clock);
        let handle = tokio::spawn(dispatcher.run());
        (hub, handle)
    }

    pub fn config(&self) -> &HubConfig {
        &self.registry.config
    }

    /// Current time (seconds) from the hub's clock
    pub fn now(&self) -> i64 {
        self.registry.clock.now_unix_secs()
    }

    /// Create a connection for an authenticated identity.
    ///
    /// The connection is not a member of anything until [`Hub::register`] has
    /// been processed.
    pub fn new_connection(
        &self,
        identity: Identity,
        remote_addr: Option<SocketAddr>,
        user_agent: Option<String>,
    ) -> (Arc<Connection>, OutboundReceiver) {
        let meta = ConnectionMeta {
            remote_addr,
            user_agent,
            connected_at: self.now(),
        };
        Connection::new(identity, meta, self.registry.config.outbound_capacity.max(1))
    }

    /// Queue a registration. Fire-and-forget.
    pub fn register(&self, connection: Arc<Connection>) {
        if let Err(e) = self.register_tx.send(connection) {
            tracing::error!(
                connection_id = %e.0.id(),
                "Hub dispatcher is gone, registration dropped"
            );
        }
    }

    /// Queue an unregistration. Fire-and-forget and safe to repeat.
    pub fn unregister(&self, connection: Arc<Connection>) {
        if let Err(e) = self.unregister_tx.send(connection) {
            // Nobody will route to it any more; just stop its writer.
            e.0.close();
            tracing::error!(
                connection_id = %e.0.id(),
                "Hub dispatcher is gone, unregistration dropped"
            );
        }
    }

    /// Hand an already addressed message to the central broadcast queue.
    pub fn submit(&self, message: Message) {
        match self.broadcast_tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                tracing::warn!(
                    tenant_id = %message.tenant_id(),
                    message_type = %message.kind(),
                    "Hub broadcast queue is full, dropping message"
                );
            }
            Err(TrySendError::Closed(message)) => {
                tracing::error!(
                    tenant_id = %message.tenant_id(),
                    message_type = %message.kind(),
                    "Hub dispatcher is gone, dropping message"
                );
            }
        }
    }

    pub fn broadcast_to_tenant(
        &self,
        tenant_id: TenantId,
        kind: MessageType,
        payload: Option<Value>,
    ) {
        let message = Message::new(kind, tenant_id, self.now()).with_optional_payload(payload);
        self.submit(message);
    }

    pub async fn broadcast_to_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        kind: MessageType,
        payload: Option<Value>,
    ) {
        let Some(room) = self.room(tenant_id).await else {
            tracing::debug!(
                tenant_id = %tenant_id,
                user_id = %user_id,
                "No room for tenant, targeted message dropped"
            );
            return;
        };

        let message = Message::new(kind, tenant_id, self.now())
            .with_origin(user_id)
            .with_optional_payload(payload);
        let frame: Frame = match encode_frame(&message) {
            Ok(json) => json.into(),
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
                return;
            }
        };

        let delivered = room.send_to_user(user_id, frame).await;
        tracing::debug!(
            tenant_id = %tenant_id,
            user_id = %user_id,
            message_type = %kind,
            delivered,
            "Targeted message sent"
        );
    }

    pub async fn online_users(&self, tenant_id: TenantId) -> Vec<UserId> {
        match self.room(tenant_id).await {
            Some(room) => room.online_users().await,
            None => Vec::new(),
        }
    }

    pub async fn client_count(&self, tenant_id: TenantId) -> usize {
        match self.room(tenant_id).await {
            Some(room) => room.len().await,
            None => 0,
        }
    }

    pub async fn connections(&self, tenant_id: TenantId) -> Vec<ConnectionInfo> {
        match self.room(tenant_id).await {
            Some(room) => room.connections().await,
            None => Vec::new(),
        }
    }

    /// Number of tenants with a live room
    pub async fn room_count(&self) -> usize {
        self.registry.rooms.read().await.len()
    }

    async fn room(&self, tenant_id: TenantId) -> Option<Arc<TenantRoom>> {
        self.registry.rooms.read().await.get(&tenant_id).cloned()
    }
}

#[async_trait]
impl EventPusher for Hub {
    async fn broadcast_to_tenant(
        &self,
        tenant_id: TenantId,
        kind: MessageType,
        payload: Option<Value>,
    ) {
        Hub::broadcast_to_tenant(self, tenant_id, kind, payload);
    }

    async fn broadcast_to_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        kind: MessageType,
        payload: Option<Value>,
    ) {
        Hub::broadcast_to_user(self, tenant_id, user_id, kind, payload).await;
    }
}

#[async_trait]
impl PresenceRepository for Hub {
    async fn online_users(&self, tenant_id: TenantId) -> Vec<UserId> {
        Hub::online_users(self, tenant_id).await
    }

    async fn client_count(&self, tenant_id: TenantId) -> usize {
        Hub::client_count(self, tenant_id).await
    }

    async fn connections(&self, tenant_id: TenantId) -> Vec<ConnectionInfo> {
        Hub::connections(self, tenant_id).await
    }
}

/// The hub's single control-plane task
pub struct Dispatcher {
    registry: Arc<Registry>,
    register_rx: mpsc::UnboundedReceiver<Arc<Connection>>,
    unregister_rx: mpsc::UnboundedReceiver<Arc<Connection>>,
    broadcast_rx: mpsc::Receiver<Message>,
}

impl Dispatcher {
    /// Run until every [`Hub`] handle has been dropped.
    ///
    /// Registrations are polled first, then unregistrations, so a connection's
    /// unregistration is never processed ahead of its registration.
    pub async fn run(mut self) {
        tracing::info!("Hub dispatcher started");

        loop {
            tokio::select! {
                biased;
                Some(connection) = self.register_rx.recv() => self.register(connection).await,
                Some(connection) = self.unregister_rx.recv() => self.unregister(connection).await,
                Some(message) = self.broadcast_rx.recv() => self.route(message).await,
                else => break,
            }
        }

        tracing::info!("Hub dispatcher stopped");
    }

    async fn register(&self, connection: Arc<Connection>) {
        if connection.is_closed() {
            tracing::debug!(
                connection_id = %connection.id(),
                "Connection closed before registration, skipping"
            );
            return;
        }

        let tenant_id = connection.tenant_id();
        let room = {
            let mut rooms = self.registry.rooms.write().await;
            rooms
                .entry(tenant_id)
                .or_insert_with(|| {
                    tracing::info!(tenant_id = %tenant_id, "Tenant room created");
                    TenantRoom::spawn(tenant_id, self.registry.config.room_queue_capacity)
                })
                .clone()
        };

        let client_count = room.insert(connection.clone()).await;
        connection.mark_active();
        connection.set_presence_announced();

        tracing::info!(
            user_id = %connection.user_id(),
            tenant_id = %tenant_id,
            client_count,
            "Client connected"
        );

        let joined = self.presence_message(MessageType::UserJoined, &connection);
        if let Err(e) = room.offer(joined) {
            tracing::warn!(tenant_id = %tenant_id, "Dropping user_joined event: {}", e);
        }
    }

    async fn unregister(&self, connection: Arc<Connection>) {
        connection.mark_closing();
        let tenant_id = connection.tenant_id();

        let Some(room) = self.registry.rooms.read().await.get(&tenant_id).cloned() else {
            connection.close();
            return;
        };

        room.remove(connection.id()).await;
        connection.close();

        // Also true for connections already dropped as slow consumers, which
        // left the member set without an announcement.
        if connection.take_presence_announced() {
            let client_count = room.len().await;
            tracing::info!(
                user_id = %connection.user_id(),
                tenant_id = %tenant_id,
                client_count = client_count,
                "Client disconnected"
            );

            let left = self.presence_message(MessageType::UserLeft, &connection);
            if let Err(e) = room.offer(left) {
                tracing::warn!(tenant_id = %tenant_id, "Dropping user_left event: {}", e);
            }
        }

        if room.is_empty().await {
            self.registry.rooms.write().await.remove(&tenant_id);
            tracing::info!(tenant_id = %tenant_id, "Tenant room removed");
        }
    }

    async fn route(&self, message: Message) {
        let tenant_id = message.tenant_id();
        let Some(room) = self.registry.rooms.read().await.get(&tenant_id).cloned() else {
            tracing::warn!(
                tenant_id = %tenant_id,
                message_type = %message.kind(),
                "Attempted to broadcast to non-existent tenant room"
            );
            return;
        };

        if let Err(e) = room.offer(message) {
            tracing::warn!(
                tenant_id = %tenant_id,
                "Tenant room broadcast queue rejected message: {}",
                e
            );
        }
    }

    fn presence_message(&self, kind: MessageType, connection: &Connection) -> Message {
        let identity = connection.identity();
        Message::new(kind, identity.tenant_id, self.registry.clock.now_unix_secs())
            .with_origin(identity.user_id)
            .with_payload(json!({
                "user_id": identity.user_id,
                "user_name": identity.user_name,
            }))
    }
}
