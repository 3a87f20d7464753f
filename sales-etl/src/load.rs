//! Load stage: delete the run's partition, then append the transformed rows.

use tracing::info;

use crate::error::EtlResult;
use crate::partition::RunContext;
use crate::query::TableRef;
use crate::types::RowBatch;
use crate::warehouse::{LoadOptions, Warehouse};

/// Row counts reported by [`load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub deleted_rows: u64,
    pub loaded_rows: u64,
}

/// Replaces the run's partition of `table` with `batch`.
///
/// The delete always runs, even when `batch` is empty, so stale rows for the partition
/// are cleared. The two steps are not atomic: if the append fails the partition holds
/// whatever part of `batch` the warehouse had already committed, possibly nothing, until
/// the next successful run for the same date.
pub async fn load<W>(
    warehouse: &W,
    table: &TableRef,
    partition_column: &str,
    batch: RowBatch,
    ctx: &RunContext,
    options: &LoadOptions,
) -> EtlResult<LoadSummary>
where
    W: Warehouse,
{
    let date = ctx.partition_date();

    info!(%table, %date, "deleting partition from destination table");
    let deleted_rows = warehouse
        .delete_partition(table, partition_column, date)
        .await?;
    info!(%table, %date, deleted_rows, "partition deleted");

    info!(%table, %date, rows = batch.len(), "loading rows into destination table");
    let loaded_rows = warehouse.append_rows(table, batch, options).await?;
    info!(%table, %date, loaded_rows, "rows loaded");

    Ok(LoadSummary {
        deleted_rows,
        loaded_rows,
    })
}
