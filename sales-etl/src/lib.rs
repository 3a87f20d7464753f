//! Daily sales-report ETL jobs.
//!
//! Each job extracts one day of rows from a warehouse source table, pseudonymizes direct
//! identifiers, applies a declarative list of column transforms, deletes the day's
//! partition from the destination table and appends the transformed rows.
//!
//! The warehouse is abstracted behind [`warehouse::Warehouse`]. The crate ships an
//! in-memory implementation; the BigQuery one lives in `sales-destinations`.

pub mod error;
pub mod extract;
pub mod hashing;
pub mod job;
pub mod load;
mod macros;
pub mod partition;
pub mod pipeline;
pub mod query;
pub mod secrets;
pub mod transform;
pub mod types;
pub mod warehouse;
