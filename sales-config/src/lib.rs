//! Configuration loading for the sales ETL jobs.
//!
//! Configuration is layered: `configuration/base.yaml`, then
//! `configuration/{APP_ENVIRONMENT}.yaml`, then `APP_`-prefixed environment variables, then
//! a few well-known variables such as `DATABRICKS_HOST`. Secrets are held in
//! [`secrecy::SecretString`] and the structs holding them are not serializable.

mod environment;
mod load;
pub mod shared;

pub use environment::{APP_ENVIRONMENT_ENV_NAME, Environment};
pub use load::{Config, LoadConfigError, load_config, load_config_from};
