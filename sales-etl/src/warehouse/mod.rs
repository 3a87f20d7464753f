//! Warehouse abstractions for ETL jobs.
//!
//! This module provides the [`Warehouse`] trait every job runs against and an in-memory
//! implementation used in tests and local development.

mod base;
pub mod memory;

pub use base::{LoadOptions, Warehouse};
