//! Hiroba: tenant-partitioned realtime presence and broadcast hub.
//!
//! Clients connect over WebSocket and are grouped into one room per tenant.
//! Other services push domain events into a tenant (or to a single user) and
//! the hub fans them out; presence is announced on join and leave.
//!
//! ## Layers
//!
//! - `domain`: identifiers, message envelope, ports
//! - `infrastructure`: the hub itself and the wire DTOs
//! - `usecase`: frame routing, presence queries, event publishing
//! - `ui`: axum server, WebSocket pumps, HTTP API

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
