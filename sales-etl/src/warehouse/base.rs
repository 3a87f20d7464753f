use std::future::Future;

use crate::error::EtlResult;
use crate::partition::PartitionDate;
use crate::query::TableRef;
use crate::types::{ColumnSchema, RowBatch};

/// Options controlling how rows are appended to a destination table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Explicit destination schema used when the table has to be created.
    ///
    /// Empty means the schema is inferred from the batch being loaded.
    pub schema: Vec<ColumnSchema>,
}

impl LoadOptions {
    /// Options that infer the destination schema from the batch.
    pub fn infer() -> Self {
        Self::default()
    }

    /// Returns the schema to create the destination table with.
    pub fn table_schema<'a>(&'a self, batch: &'a RowBatch) -> &'a [ColumnSchema] {
        if self.schema.is_empty() {
            batch.columns()
        } else {
            &self.schema
        }
    }
}

/// A data warehouse a job reads from and writes to.
///
/// One instance is created per run from the resolved credentials and passed explicitly to
/// every stage. Calls are issued one at a time and each call completes before the next
/// one starts; implementations never retry.
///
/// Deleting a partition and appending rows are two separate calls. A failure between them
/// leaves the partition empty until the next successful run.
///
/// An append is not required to be atomic either. Implementations that send rows in
/// several requests may leave the rows of acknowledged requests behind when a later
/// request fails.
pub trait Warehouse {
    /// Returns the name of the warehouse implementation.
    fn name() -> &'static str;

    /// Runs a query and materializes its entire result set.
    ///
    /// The call returns once the query job has completed and every result page has been
    /// fetched.
    fn query(&self, sql: &str) -> impl Future<Output = EtlResult<RowBatch>> + Send;

    /// Deletes every row of `table` whose `column` equals `date`.
    ///
    /// Returns the number of deleted rows. A table that does not exist yet has nothing to
    /// delete and yields `0`.
    fn delete_partition(
        &self,
        table: &TableRef,
        column: &str,
        date: PartitionDate,
    ) -> impl Future<Output = EtlResult<u64>> + Send;

    /// Appends `batch` to `table` and returns the number of appended rows.
    ///
    /// The table is created first when it does not exist, using
    /// [`LoadOptions::table_schema`]. Existing rows are never modified. An empty batch is
    /// a successful no-op apart from the table creation.
    fn append_rows(
        &self,
        table: &TableRef,
        batch: RowBatch,
        options: &LoadOptions,
    ) -> impl Future<Output = EtlResult<u64>> + Send;
}
