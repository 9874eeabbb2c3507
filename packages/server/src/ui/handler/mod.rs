//! HTTP and WebSocket handlers.

mod http;
mod pump;
mod websocket;

pub use http::{get_presence, health_check, notify_user, publish_event, publish_task_event};
pub use websocket::websocket_handler;
