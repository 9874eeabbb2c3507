//! Tenant-partitioned presence and broadcast hub.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- --host 0.0.0.0 --port 3000 --log-format json
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use hiroba_server::{
    config::{ConnectionConfig, DEFAULT_QUEUE_CAPACITY, HubConfig},
    infrastructure::hub::Hub,
    ui::Server,
    usecase::{GetPresenceUseCase, PublishEventUseCase},
};
use hiroba_shared::{
    logger::{LogFormat, setup_logger},
    time::SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "hiroba-server")]
#[command(about = "Realtime presence and broadcast hub, partitioned by tenant", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HIROBA_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "HIROBA_PORT", default_value = "8080")]
    port: u16,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, env = "HIROBA_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format: pretty or json
    #[arg(long, env = "HIROBA_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Outbound queue capacity of each connection
    #[arg(long, env = "HIROBA_OUTBOUND_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    outbound_capacity: usize,

    /// Fan-out queue capacity of each tenant room
    #[arg(long, env = "HIROBA_ROOM_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    room_queue_capacity: usize,

    /// Capacity of the central broadcast queue
    #[arg(long, env = "HIROBA_HUB_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    hub_queue_capacity: usize,

    /// Seconds of inbound silence before a connection is dropped
    #[arg(long, env = "HIROBA_PONG_WAIT_SECS", default_value_t = 60)]
    pong_wait_secs: u64,

    /// Seconds between transport pings
    #[arg(long, env = "HIROBA_PING_PERIOD_SECS", default_value_t = 54)]
    ping_period_secs: u64,

    /// Seconds allowed for a single write
    #[arg(long, env = "HIROBA_WRITE_WAIT_SECS", default_value_t = 10)]
    write_wait_secs: u64,

    /// Maximum inbound frame size in bytes
    #[arg(long, env = "HIROBA_MAX_MESSAGE_SIZE", default_value_t = 512)]
    max_message_size: usize,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level, args.log_format);

    let hub_config = HubConfig {
        outbound_capacity: args.outbound_capacity,
        room_queue_capacity: args.room_queue_capacity,
        hub_queue_capacity: args.hub_queue_capacity,
    };
    let connection_config = ConnectionConfig {
        write_wait: Duration::from_secs(args.write_wait_secs),
        pong_wait: Duration::from_secs(args.pong_wait_secs),
        ping_period: Duration::from_secs(args.ping_period_secs),
        max_message_size: args.max_message_size,
    };
    if let Err(e) = hub_config
        .validate()
        .and_then(|()| connection_config.validate())
    {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // 1. Hub (dispatcher runs until every handle is dropped)
    let (hub, _dispatcher) = Hub::spawn(hub_config, Arc::new(SystemClock));

    // 2. UseCases
    let get_presence_usecase = Arc::new(GetPresenceUseCase::new(Arc::new(hub.clone())));
    let publish_event_usecase = Arc::new(PublishEventUseCase::new(Arc::new(hub.clone())));

    // 3. Server
    let server = Server::new(
        hub,
        connection_config,
        get_presence_usecase,
        publish_event_usecase,
    );
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
