//! ledgerline-domain
//!
//! Pure domain models (Account, Category, Transaction, Budget, PlannedTransaction, etc.).
//! No I/O, no storage. Only data types, drafts and core enums.

pub mod account;
pub mod budget;
pub mod category;
pub mod common;
pub mod planned;
pub mod transaction;

pub use account::*;
pub use budget::*;
pub use category::*;
pub use common::*;
pub use planned::*;
pub use transaction::*;
