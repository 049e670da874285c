//! Shared types and models for the Cooperative Management Platform
//!
//! This crate contains the domain types, state machines and payment
//! calculation shared between the backend and the browser (via WASM).

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use types::*;
pub use validation::*;
