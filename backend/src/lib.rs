//! Stockroom back-office: stock ledger, valuation and reconciliation engine

pub mod config;
pub mod error;
pub mod jobs;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
