//! Configuration for the GFW ingestion service.
//!
//! The service reads one YAML document listing tenants, the record store
//! location and stabilization timing. [`ConfigLoader`] reads and parses it,
//! anchors relative paths at the working directory and runs the guard rails
//! in [`validation`].

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoader, DEFAULT_CONFIG_PATH,
    error::ConfigLoadError,
};
pub use models::{
    Config, DEFAULT_DATABASE_PATH, DatabaseConfig, StabilitySettings,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
