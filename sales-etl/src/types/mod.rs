//! Common types used throughout the ETL pipeline.
//!
//! A [`RowBatch`] is the in-memory result of one extraction: typed columns plus rows of
//! [`Cell`] values. Transform rules and warehouse implementations exchange data exclusively
//! through it.

mod batch;
mod cell;

pub use batch::*;
pub use cell::*;
