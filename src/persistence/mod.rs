//! Persistence layer: the finished-card result store.
//!
//! Provides the [`ResultStore`] trait with in-memory and PostgreSQL
//! implementations. The concrete PostgreSQL implementation uses
//! `sqlx::PgPool` for async access.

pub mod memory;
pub mod postgres;
pub mod result_store;

pub use memory::InMemoryResultStore;
pub use postgres::PostgresResultStore;
pub use result_store::ResultStore;
