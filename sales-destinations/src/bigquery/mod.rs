mod client;
mod core;
mod encoding;
#[cfg(test)]
mod test_utils;

pub use client::{BigQueryApi, BigQueryClient, BigQueryProjectId};
pub use core::BigQueryWarehouse;
