//! ledgerline-core
//!
//! Ledger consistency services: transaction posting, transfers, balance
//! chains, budget aggregation, recurrence expansion and forecasting.
//! Depends on ledgerline-domain. No terminal I/O; persistence goes through
//! the `LedgerStore` trait.

mod access;
pub mod audit;
pub mod balance_chain;
pub mod budget_aggregator;
pub mod currency;
pub mod error;
pub mod forecast_service;
pub mod memory;
pub mod planned_service;
pub mod recurrence;
pub mod store;
pub mod transaction_processor;
pub mod transfer;

pub use audit::*;
pub use balance_chain::*;
pub use budget_aggregator::*;
pub use currency::*;
pub use error::{CoreError, CoreResult};
pub use forecast_service::*;
pub use memory::*;
pub use planned_service::*;
pub use recurrence::*;
pub use store::LedgerStore;
pub use transaction_processor::*;
pub use transfer::TransferCoordinator;
