//! Domain models for the stock ledger

mod item;
mod movement;
mod report;
mod rollup;
mod sale;
mod valuation;

pub use item::*;
pub use movement::*;
pub use report::*;
pub use rollup::*;
pub use sale::*;
pub use valuation::*;
