//! Real-time notification delivery over WebSocket.
//!
//! A single [`Hub`] actor owns the set of connected clients; each
//! connection runs its own inbound and outbound pumps (see [`client`]).

pub mod client;
mod handler;
pub mod hub;
pub mod keepalive;

pub use client::TransportError;
pub use handler::ws_handler;
pub use hub::{ClientHandle, Hub, HubLoop, DEFAULT_CLIENT_QUEUE_CAPACITY};
pub use keepalive::ConnectionSettings;
