//! WebSocket connection handlers.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ConnectInfo, Query, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header::USER_AGENT},
    response::IntoResponse,
};
use futures_util::StreamExt;
use serde::Deserialize;

use crate::{
    domain::{Identity, TenantId, UserId},
    ui::state::AppState,
};

use super::pump::{read_pump, write_pump};

/// Identity handed over by the authenticating gateway in front of the hub
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    let identity = Identity::new(
        query.user_id,
        query.user_name.unwrap_or_else(|| "Unknown User".to_string()),
        query.tenant_id,
        query.role.unwrap_or_else(|| "user".to_string()),
    );
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    tracing::debug!(
        user_id = %identity.user_id,
        tenant_id = %identity.tenant_id,
        remote_addr = %remote_addr,
        "WebSocket upgrade requested"
    );

    ws.max_message_size(state.connection_config.max_message_size)
        .on_upgrade(move |socket| {
            handle_socket(socket, state, identity, remote_addr, user_agent)
        })
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    identity: Identity,
    remote_addr: SocketAddr,
    user_agent: Option<String>,
) {
    let hub = state.hub.clone();
    let config = state.connection_config;

    let (connection, outbound) = hub.new_connection(identity, Some(remote_addr), user_agent);
    hub.register(connection.clone());

    let (sender, receiver) = socket.split();

    let mut write_task = tokio::spawn(write_pump(sender, outbound, config));
    let mut read_task = tokio::spawn(read_pump(
        receiver,
        connection.clone(),
        hub.clone(),
        config,
    ));

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut read_task => write_task.abort(),
        _ = &mut write_task => read_task.abort(),
    };

    connection.mark_closing();
    hub.unregister(connection);
}
