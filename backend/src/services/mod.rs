//! Business logic services for the Stockroom back-office

pub mod ledger;
pub mod reconciliation;
pub mod rollup;
pub mod valuation;

pub use ledger::{BalanceCheck, RecordMovementInput, StockLedger};
pub use reconciliation::ReconciliationReporter;
pub use rollup::MonthlyRollupService;
pub use valuation::ValuationService;
