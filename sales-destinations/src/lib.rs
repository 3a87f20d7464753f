//! Warehouse implementations backed by real services.

pub mod bigquery;
pub mod encryption;
