//! Connection registry: live connections and card-key subscriptions.
//!
//! The registry tracks every active push connection, the card keys it
//! subscribed to, and an expiry watermark that a periodic sweep
//! enforces. Lookups used on the hot fan-out path (`subscribers_of`)
//! are index-backed in both store implementations.

pub mod memory;
pub mod postgres;
pub mod registry;
pub mod store;

pub use memory::InMemoryConnectionStore;
pub use postgres::PostgresConnectionStore;
pub use registry::{ConnectionRegistry, spawn_expiry_sweep};
pub use store::ConnectionStore;
