#![doc(test(attr(deny(warnings))))]

//! Ledgerline keeps a personal-finance ledger consistent: balances, running
//! balance chains, transfer pairs and budget totals move together on every
//! write, and planned transactions expand into forecasts.

pub mod engine;
pub mod errors;
pub mod utils;

pub use engine::Engine;
pub use errors::{LedgerError, LedgerResult};
pub use ledgerline_config;
pub use ledgerline_core;
pub use ledgerline_domain;
pub use ledgerline_storage_json;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("ledgerline tracing initialized");
    });
}
