//! Data Transfer Objects for REST request/response serialization.

pub mod card_dto;
pub mod dead_letter_dto;

pub use card_dto::*;
pub use dead_letter_dto::*;
