//! # lexicast
//!
//! Job-dispatch and real-time notification core for vocabulary card
//! generation.
//!
//! Clients submit card requests over REST and subscribe to card keys
//! over WebSocket. Each distinct key is generated at most once at a
//! time: concurrent requests for the same card coalesce onto one
//! in-flight job, and every subscriber receives the same stream of
//! stage events as the generation pipeline runs.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)          submit / poll / dead letters
//!     ├── WS Handler (ws/)              subscribe / receive events
//!     │
//!     ├── AdmissionController (admission/)
//!     ├── ConnectionRegistry (registry/)
//!     │
//!     ├── WorkQueue + DeadLetterChannel (queue/)
//!     ├── Workers + CardPipeline (dispatch/)
//!     │
//!     ├── Broadcaster + PushTransport (broadcast/)
//!     └── ResultStore (persistence/)
//! ```

pub mod admission;
pub mod api;
pub mod app_state;
pub mod broadcast;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod queue;
pub mod registry;
pub mod ws;
