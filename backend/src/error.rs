//! Error handling for the Stockroom back-office
//!
//! Errors fall into three groups: caller contract violations, recoverable
//! business-rule rejections, and infrastructure failures. Data inconsistencies
//! found by reconciliation are never errors; they are reported as data.

use shared::ValuationError;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Contract violations
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Negative quantity: {0}")]
    NegativeQuantity(String),

    #[error("Negative price: {0}")]
    NegativePrice(String),

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    // Business rule rejections
    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: Uuid,
        requested: i64,
        available: i64,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidQuantity(_) => "INVALID_QUANTITY",
            AppError::NegativeQuantity(_) => "NEGATIVE_QUANTITY",
            AppError::NegativePrice(_) => "NEGATIVE_PRICE",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Migration(_) => "MIGRATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// The caller may retry with a smaller quantity or an override
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::InsufficientStock { .. })
    }

    /// The caller passed input it should never have produced
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidQuantity(_)
                | AppError::NegativeQuantity(_)
                | AppError::NegativePrice(_)
                | AppError::Validation { .. }
        )
    }

    pub(crate) fn corrupt_row(what: &str, detail: String) -> Self {
        AppError::Internal(format!("Corrupt {} row: {}", what, detail))
    }
}

impl From<ValuationError> for AppError {
    fn from(err: ValuationError) -> Self {
        match err {
            ValuationError::NegativeQuantity(_) => AppError::NegativeQuantity(err.to_string()),
            ValuationError::NegativePrice { .. } => AppError::NegativePrice(err.to_string()),
            ValuationError::Overflow(_) => AppError::InvalidQuantity(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|field| field.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Result type alias for services
pub type AppResult<T> = Result<T, AppError>;
