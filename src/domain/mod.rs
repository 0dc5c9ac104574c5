//! Domain layer: core identities, job lifecycle, and events.
//!
//! This module contains the server-side domain model: the canonical
//! card key, job identity and status, connection identity, and the
//! event types fanned out to subscribers.

pub mod card_key;
pub mod connection;
pub mod job;
pub mod job_event;

pub use card_key::CardKey;
pub use connection::{ConnectionId, ConnectionRecord};
pub use job::{Job, JobId, JobStatus};
pub use job_event::{CardEvent, EventEnvelope};
