//! Read and write pumps of one WebSocket connection.
//!
//! Both pumps are generic over the socket halves so they can be driven by
//! in-memory streams and sinks in tests.
//!
//! ## Heartbeat
//!
//! The write pump sends a transport ping every `ping_period`; the peer's pong
//! (like any other inbound frame) refreshes the read pump's `pong_wait`
//! deadline. A peer that stays silent past the deadline is disconnected.

use std::{fmt::Display, sync::Arc, time::Duration};

use axum::{body::Bytes, extract::ws::Message as WsMessage};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};

use crate::{
    config::ConnectionConfig,
    domain::Message,
    infrastructure::{
        dto::conversion::encode_frame,
        hub::{Connection, Hub, OutboundReceiver},
    },
    usecase::{InboundAction, error_reply, route_inbound_frame},
};

/// Read inbound frames until the peer closes, errors or goes silent.
pub async fn read_pump<S, E>(
    mut stream: S,
    connection: Arc<Connection>,
    hub: Hub,
    config: ConnectionConfig,
) where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    loop {
        let next = match timeout(config.pong_wait, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                tracing::info!(
                    connection_id = %connection.id(),
                    user_id = %connection.user_id(),
                    "Read deadline exceeded, closing connection"
                );
                break;
            }
        };

        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                tracing::warn!(connection_id = %connection.id(), "WebSocket error: {}", e);
                break;
            }
            None => break,
        };

        match msg {
            WsMessage::Text(text) => handle_text(&connection, &hub, text.as_str()),
            WsMessage::Binary(bytes) => {
                handle_text(&connection, &hub, &String::from_utf8_lossy(&bytes))
            }
            WsMessage::Pong(_) => {
                tracing::trace!(connection_id = %connection.id(), "Heartbeat pong");
            }
            WsMessage::Ping(_) => {
                // axum answers transport pings itself
                tracing::trace!(connection_id = %connection.id(), "Received ping");
            }
            WsMessage::Close(_) => {
                tracing::info!(connection_id = %connection.id(), "Client requested close");
                break;
            }
        }
    }
}

fn handle_text(connection: &Connection, hub: &Hub, text: &str) {
    let now = hub.now();
    match route_inbound_frame(connection.identity(), text, now) {
        Ok(InboundAction::Reply(message)) => reply(connection, &message),
        Ok(InboundAction::Broadcast(message)) => hub.submit(message),
        Err(e) => {
            tracing::warn!(
                connection_id = %connection.id(),
                user_id = %connection.user_id(),
                "Failed to parse WebSocket message: {}",
                e
            );
            reply(connection, &error_reply(connection.identity(), &e, now));
        }
    }
}

/// Enqueue on the connection's own queue. A connection that cannot take its
/// own reply is closed.
fn reply(connection: &Connection, message: &Message) {
    let frame = match encode_frame(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(connection_id = %connection.id(), "Failed to serialize reply: {}", e);
            return;
        }
    };
    if let Err(e) = connection.try_enqueue(frame.into()) {
        tracing::warn!(
            connection_id = %connection.id(),
            user_id = %connection.user_id(),
            "Cannot enqueue reply, closing connection: {}",
            e
        );
        connection.close();
    }
}

/// Drain the outbound queue into the socket and keep the heartbeat going.
///
/// Ends when the queue is closed (after a best-effort close frame) or when a
/// write fails or misses its deadline.
pub async fn write_pump<S>(mut sink: S, mut outbound: OutboundReceiver, config: ConnectionConfig)
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    let mut heartbeat = interval_at(Instant::now() + config.ping_period, config.ping_period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // unregistered or dropped as a slow consumer
                    let _ = timeout(config.write_wait, sink.send(WsMessage::Close(None))).await;
                    break;
                };
                let msg = WsMessage::Text(frame.to_string().into());
                if !send_with_deadline(&mut sink, msg, config.write_wait).await {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if !send_with_deadline(&mut sink, WsMessage::Ping(Bytes::new()), config.write_wait).await {
                    break;
                }
            }
        }
    }
}

async fn send_with_deadline<S>(sink: &mut S, msg: WsMessage, deadline: Duration) -> bool
where
    S: Sink<WsMessage> + Unpin,
    S::Error: Display,
{
    match timeout(deadline, sink.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!("Failed to write to WebSocket: {}", e);
            false
        }
        Err(_) => {
            tracing::warn!("Write deadline exceeded");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::HubConfig,
        domain::{Identity, MessageType, TenantId, UserId},
        infrastructure::dto::websocket::WireMessage,
    };
    use futures_util::{sink, stream};
    use hiroba_shared::time::FixedClock;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    const NOW: i64 = 1_700_000_000;

    fn text(s: &str) -> WsMessage {
        WsMessage::Text(s.to_string().into())
    }

    async fn recv_wire(rx: &mut OutboundReceiver) -> Option<WireMessage> {
        let frame = timeout(Duration::from_secs(1), rx.recv()).await.ok()??;
        serde_json::from_str(&frame).ok()
    }

    #[tokio::test]
    async fn test_read_pump_routes_frames() {
        // テスト項目: ping には pong、不正フレームにはエラー、それ以外は自分の ID でブロードキャストされる
        // given (前提条件):
        let (hub, _dispatcher) = Hub::spawn(HubConfig::default(), Arc::new(FixedClock::new(NOW)));
        let tenant_id = TenantId::new(Uuid::new_v4());
        let user_id = UserId::new(Uuid::new_v4());
        let (connection, mut rx) =
            hub.new_connection(Identity::new(user_id, "Alice", tenant_id, "member"), None, None);
        hub.register(connection.clone());
        let joined = recv_wire(&mut rx).await.unwrap();
        assert_eq!(joined.r#type, MessageType::UserJoined);

        let spoofed = format!(
            r#"{{"type":"typing","user_id":"{}","tenant_id":"{}","message_id":"forged"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let frames = stream::iter(vec![
            Ok::<_, std::io::Error>(text(r#"{"type":"ping"}"#)),
            Ok(text("not json")),
            Ok(text(&spoofed)),
        ]);

        // when (操作):
        read_pump(frames, connection.clone(), hub.clone(), ConnectionConfig::default()).await;

        // then (期待する結果):
        let mut received = Vec::new();
        while received.len() < 3 {
            received.push(recv_wire(&mut rx).await.unwrap());
        }
        let kinds: Vec<MessageType> = received.iter().map(|w| w.r#type).collect();
        assert!(kinds.contains(&MessageType::Pong));
        assert!(kinds.contains(&MessageType::Error));
        let typing = received
            .iter()
            .find(|w| w.r#type == MessageType::Typing)
            .unwrap();
        assert_eq!(typing.user_id, Some(user_id));
        assert_eq!(typing.tenant_id, tenant_id);
        assert_eq!(typing.timestamp, NOW);
        assert_ne!(typing.message_id.as_str(), "forged");
    }

    #[tokio::test]
    async fn test_read_pump_stops_on_close_frame() {
        // テスト項目: Close フレーム以降のフレームは処理されない
        // given (前提条件):
        let (hub, _dispatcher) = Hub::spawn(HubConfig::default(), Arc::new(FixedClock::new(NOW)));
        let identity = Identity::new(
            UserId::new(Uuid::new_v4()),
            "Alice",
            TenantId::new(Uuid::new_v4()),
            "member",
        );
        let (connection, mut rx) = hub.new_connection(identity, None, None);
        let frames = stream::iter(vec![
            Ok::<_, std::io::Error>(WsMessage::Close(None)),
            Ok(text(r#"{"type":"ping"}"#)),
        ]);

        // when (操作):
        read_pump(frames, connection, hub, ConnectionConfig::default()).await;

        // then (期待する結果):
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_write_pump_drains_queue_then_sends_close() {
        // テスト項目: キューに残ったフレームを書き出した後、Close フレームを送って終了する
        // given (前提条件):
        let identity = Identity::new(
            UserId::new(Uuid::new_v4()),
            "Alice",
            TenantId::new(Uuid::new_v4()),
            "member",
        );
        let (hub, _dispatcher) = Hub::spawn(HubConfig::default(), Arc::new(FixedClock::new(NOW)));
        let (connection, outbound) = hub.new_connection(identity, None, None);
        connection.try_enqueue("first".into()).unwrap();
        connection.try_enqueue("second".into()).unwrap();
        connection.close();

        let (tx, mut written) = mpsc::unbounded_channel::<WsMessage>();
        let socket = Box::pin(sink::unfold(tx, |tx, msg: WsMessage| async move {
            tx.send(msg).map_err(|_| "socket closed")?;
            Ok::<_, &'static str>(tx)
        }));

        // when (操作):
        timeout(
            Duration::from_secs(1),
            write_pump(socket, outbound, ConnectionConfig::default()),
        )
        .await
        .unwrap();

        // then (期待する結果):
        assert_eq!(written.recv().await, Some(text("first")));
        assert_eq!(written.recv().await, Some(text("second")));
        assert!(matches!(written.recv().await, Some(WsMessage::Close(None))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_pump_gives_up_after_pong_wait() {
        // テスト項目: 何も受信しない接続は pong_wait 経過後に読み取りを終了する
        // given (前提条件):
        let (hub, _dispatcher) = Hub::spawn(HubConfig::default(), Arc::new(FixedClock::new(NOW)));
        let identity = Identity::new(
            UserId::new(Uuid::new_v4()),
            "Alice",
            TenantId::new(Uuid::new_v4()),
            "member",
        );
        let (connection, _rx) = hub.new_connection(identity, None, None);
        let config = ConnectionConfig::default();
        let silent = stream::pending::<Result<WsMessage, std::io::Error>>();
        let started = Instant::now();

        // when (操作):
        read_pump(silent, connection, hub, config).await;

        // then (期待する結果):
        assert!(started.elapsed() >= config.pong_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_pump_pings_idle_connection() {
        // テスト項目: 送信キューが空のままでも ping_period ごとに Ping が書き込まれる
        // given (前提条件):
        let (hub, _dispatcher) = Hub::spawn(HubConfig::default(), Arc::new(FixedClock::new(NOW)));
        let identity = Identity::new(
            UserId::new(Uuid::new_v4()),
            "Alice",
            TenantId::new(Uuid::new_v4()),
            "member",
        );
        let (_connection, outbound) = hub.new_connection(identity, None, None);
        let config = ConnectionConfig::default();

        let (tx, mut written) = mpsc::unbounded_channel::<WsMessage>();
        let socket = Box::pin(sink::unfold(tx, |tx, msg: WsMessage| async move {
            tx.send(msg).map_err(|_| "socket closed")?;
            Ok::<_, &'static str>(tx)
        }));
        let started = Instant::now();

        // when (操作):
        let pump = tokio::spawn(write_pump(socket, outbound, config));
        let first = written.recv().await;

        // then (期待する結果):
        assert!(matches!(first, Some(WsMessage::Ping(_))));
        assert!(started.elapsed() >= config.ping_period);
        pump.abort();
    }
}
