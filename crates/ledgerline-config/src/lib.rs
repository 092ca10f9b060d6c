//! ledgerline-config
//!
//! Engine settings: base currency, FX tolerance, data directories and
//! retention. Owns the Config structure plus disk persistence helpers.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{data_home, Config, HOME_ENV_VAR};
