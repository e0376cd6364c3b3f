//! Shared types and models for the Stockroom back-office
//!
//! Pure domain logic used by the backend: movement pricing, valuation,
//! report aggregation and reconciliation. Nothing in this crate performs I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
