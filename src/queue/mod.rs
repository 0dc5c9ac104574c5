//! Ordered work queue and dead-letter channel.
//!
//! The queue owns job creation (the conditional create used by
//! admission), per-key delivery ordering, the visibility timeout, and
//! the dead-letter channel for spent delivery attempts.

pub mod dead_letter;
pub mod work_queue;

pub use dead_letter::{DeadLetterChannel, DeadLetterEntry};
pub use work_queue::{EnqueueOutcome, WorkQueue, spawn_visibility_sweep};
