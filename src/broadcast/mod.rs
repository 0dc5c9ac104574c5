//! Fan-out layer: transport seam, broadcaster, and worker-side buffer.
//!
//! Events flow worker → [`EventForwarder`] → single broadcaster task →
//! [`Broadcaster::publish`] → [`PushTransport`] → per-connection
//! outbound channel. Each stage is non-blocking toward its producer.

pub mod broadcaster;
pub mod forwarder;
pub mod push;

pub use broadcaster::Broadcaster;
pub use forwarder::{EventForwarder, spawn_broadcaster};
pub use push::{PushTransport, SendOutcome, WsPushTransport};
