//! Logging setup shared by the sales ETL binaries.

pub mod tracing;
