//! Admission control: dedupe requests against results and live jobs.

pub mod controller;

pub use controller::{Admission, AdmissionController};
