//! Core business logic for agora.

pub mod services;

pub use services::*;
