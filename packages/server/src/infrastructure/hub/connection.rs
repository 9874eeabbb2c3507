//! One live client connection as seen by the hub.
//!
//! ## 責務
//!
//! - 認証済みアイデンティティのスナップショットを保持
//! - 送信キュー（bounded, multi-producer / single-consumer）の管理
//! - ライフサイクル状態 `Connecting → Active → Closing → Closed` の管理
//!
//! The consumer side of the outbound queue is the write pump, which owns the
//! `OutboundReceiver` returned by [`Connection::new`]. Every producer (room
//! fan-out, targeted send, the connection's own Pong/Error replies) goes through
//! [`Connection::try_enqueue`], so the single `Sender` lives inside the
//! connection and [`Connection::close`] closes the queue by dropping it.

use std::{
    net::SocketAddr,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::{ConnectionId, ConnectionInfo, EnqueueError, Identity, TenantId, UserId};

/// A serialized frame, shared between every recipient of one fan-out
pub type Frame = Arc<str>;

/// Consumer half of the outbound queue, owned by the write pump
pub type OutboundReceiver = mpsc::Receiver<Frame>;

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Created, registration not yet processed by the dispatcher
    Connecting = 0,
    /// Member of its tenant room
    Active = 1,
    /// Teardown started
    Closing = 2,
    /// Outbound queue closed
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Active,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Informational connection metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMeta {
    pub remote_addr: Option<SocketAddr>,
    pub user_agent: Option<String>,
    /// Unix timestamp (seconds)
    pub connected_at: i64,
}

pub struct Connection {
    id: ConnectionId,
    identity: Identity,
    meta: ConnectionMeta,
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,
    state: AtomicU8,
    /// Set once `UserJoined` went out; consumed by the single `UserLeft`
    presence_announced: AtomicBool,
}

impl Connection {
    /// Create a connection with an outbound queue of `capacity` frames.
    ///
    /// Returns the connection and the receiving half for its write pump.
    pub fn new(
        identity: Identity,
        meta: ConnectionMeta,
        capacity: usize,
    ) -> (Arc<Self>, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        let connection = Arc::new(Self {
            id: ConnectionId::generate(),
            identity,
            meta,
            outbound: Mutex::new(Some(tx)),
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            presence_announced: AtomicBool::new(false),
        });
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn meta(&self) -> &ConnectionMeta {
        &self.meta
    }

    pub fn user_id(&self) -> UserId {
        self.identity.user_id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.identity.tenant_id
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            user_id: self.identity.user_id,
            user_name: self.identity.user_name.clone(),
            role: self.identity.role.clone(),
            connected_at: self.meta.connected_at,
        }
    }

    /// Offer a frame without blocking.
    ///
    /// `Full` means the write pump is not keeping up; callers treat the
    /// connection as dead.
    pub fn try_enqueue(&self, frame: Frame) -> Result<(), EnqueueError> {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        match outbound.as_ref() {
            Some(tx) => tx.try_send(frame).map_err(|e| match e {
                TrySendError::Full(_) => EnqueueError::Full,
                TrySendError::Closed(_) => EnqueueError::Closed,
            }),
            None => Err(EnqueueError::Closed),
        }
    }

    /// Close the outbound queue. The write pump drains what is already queued
    /// and then exits.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        let sender = self
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
        sender.is_some()
    }

    pub(crate) fn mark_active(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to `Closing` unless already closed
    pub fn mark_closing(&self) {
        let _ = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < ConnectionState::Closing as u8)
                    .then_some(ConnectionState::Closing as u8)
            });
    }

    pub(crate) fn set_presence_announced(&self) {
        self.presence_announced.store(true, Ordering::Release);
    }

    /// Consume the presence flag; `true` at most once per connection.
    pub(crate) fn take_presence_announced(&self) -> bool {
        self.presence_announced.swap(false, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.identity.user_id)
            .field("tenant_id", &self.identity.tenant_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn create_test_connection(capacity: usize) -> (Arc<Connection>, OutboundReceiver) {
        let identity = Identity::new(
            UserId::new(Uuid::new_v4()),
            "Alice",
            TenantId::new(Uuid::new_v4()),
            "member",
        );
        let meta = ConnectionMeta {
            remote_addr: None,
            user_agent: None,
            connected_at: 1_000,
        };
        Connection::new(identity, meta, capacity)
    }

    #[tokio::test]
    async fn test_try_enqueue_delivers_in_order() {
        // テスト項目: 送信キューに入れたフレームが FIFO で取り出される
        // given (前提条件):
        let (conn, mut rx) = create_test_connection(4);

        // when (操作):
        conn.try_enqueue(Frame::from("first")).unwrap();
        conn.try_enqueue(Frame::from("second")).unwrap();

        // then (期待する結果):
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_try_enqueue_reports_full_queue() {
        // テスト項目: キューが満杯の場合はブロックせず Full を返す
        // given (前提条件):
        let (conn, _rx) = create_test_connection(1);
        conn.try_enqueue(Frame::from("first")).unwrap();

        // when (操作):
        let result = conn.try_enqueue(Frame::from("second"));

        // then (期待する結果):
        assert_eq!(result, Err(EnqueueError::Full));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_ends_receiver() {
        // テスト項目: close は一度だけ効果を持ち、受信側はキュー残りを読んだ後に終了する
        // given (前提条件):
        let (conn, mut rx) = create_test_connection(4);
        conn.try_enqueue(Frame::from("queued")).unwrap();

        // when (操作):
        let first = conn.close();
        let second = conn.close();

        // then (期待する結果):
        assert!(first);
        assert!(!second);
        assert!(conn.is_closed());
        assert_eq!(
            conn.try_enqueue(Frame::from("late")),
            Err(EnqueueError::Closed)
        );
        assert_eq!(rx.recv().await.as_deref(), Some("queued"));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_state_transitions() {
        // テスト項目: 状態が Connecting → Active → Closing → Closed と遷移する
        // given (前提条件):
        let (conn, _rx) = create_test_connection(1);
        assert_eq!(conn.state(), ConnectionState::Connecting);

        // when (操作) / then (期待する結果):
        assert!(conn.mark_active());
        assert_eq!(conn.state(), ConnectionState::Active);
        assert!(!conn.mark_active());

        conn.mark_closing();
        assert_eq!(conn.state(), ConnectionState::Closing);

        conn.close();
        conn.mark_closing();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_presence_flag_is_consumed_once() {
        // テスト項目: プレゼンスフラグは一度だけ取り出せる
        // given (前提条件):
        let (conn, _rx) = create_test_connection(1);
        conn.set_presence_announced();

        // when (操作):
        let first = conn.take_presence_announced();
        let second = conn.take_presence_announced();

        // then (期待する結果):
        assert!(first);
        assert!(!second);
    }
}
