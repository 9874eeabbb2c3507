//! Server execution logic.

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{
    config::ConnectionConfig,
    infrastructure::hub::Hub,
    usecase::{GetPresenceUseCase, PublishEventUseCase},
};

use super::{
    handler::{
        get_presence, health_check, notify_user, publish_event, publish_task_event,
        websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Presence and broadcast hub server
///
/// # Example
///
/// ```ignore
/// let (hub, _dispatcher) = Hub::spawn(HubConfig::default(), Arc::new(SystemClock));
/// let server = Server::new(
///     hub,
///     ConnectionConfig::default(),
///     get_presence_usecase,
///     publish_event_usecase,
/// );
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    hub: Hub,
    connection_config: ConnectionConfig,
    get_presence_usecase: Arc<GetPresenceUseCase>,
    publish_event_usecase: Arc<PublishEventUseCase>,
}

impl Server {
    pub fn new(
        hub: Hub,
        connection_config: ConnectionConfig,
        get_presence_usecase: Arc<GetPresenceUseCase>,
        publish_event_usecase: Arc<PublishEventUseCase>,
    ) -> Self {
        Self {
            hub,
            connection_config,
            get_presence_usecase,
            publish_event_usecase,
        }
    }

    /// Build the router with every endpoint mounted
    pub fn router(self) -> Router {
        let app_state = Arc::new(AppState {
            hub: self.hub,
            connection_config: self.connection_config,
            get_presence_usecase: self.get_presence_usecase,
            publish_event_usecase: self.publish_event_usecase,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/tenants/{tenant_id}/presence", get(get_presence))
            .route("/api/tenants/{tenant_id}/events", post(publish_event))
            .route("/api/tenants/{tenant_id}/tasks", post(publish_task_event))
            .route(
                "/api/tenants/{tenant_id}/users/{user_id}/notifications",
                post(notify_user),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Run the server until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Presence hub listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}
