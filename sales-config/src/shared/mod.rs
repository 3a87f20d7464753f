//! Shared configuration types for the sales ETL jobs.

mod base;
mod pseudonymization;
mod runner;
mod secrets;
mod timezone;
mod warehouse;

pub use base::ValidationError;
pub use pseudonymization::PseudonymizationConfig;
pub use runner::{RunnerConfig, RunnerConfigWithoutSecrets};
pub use secrets::{SecretStoreConfig, SecretStoreConfigWithoutSecrets};
pub use timezone::TimezoneConfig;
pub use warehouse::WarehouseConfig;
