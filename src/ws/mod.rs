//! WebSocket layer: upgrade, connection loop, control protocol.
//!
//! The WebSocket endpoint at `/ws` is the push channel: clients manage
//! card-key subscriptions over it and receive generation events as they
//! happen. Work submission itself goes through the REST API.

pub mod connection;
pub mod handler;
pub mod messages;
