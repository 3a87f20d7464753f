//! Extraction stage: one date-filtered query materialized into memory.

use tracing::info;

use crate::error::EtlResult;
use crate::hashing::{PseudonymizeRule, Pseudonymizer};
use crate::partition::RunContext;
use crate::query::QueryTemplate;
use crate::types::RowBatch;
use crate::warehouse::Warehouse;

/// Runs `template` for the run's partition and pseudonymizes the configured columns.
///
/// The whole result set is held in memory. Pseudonymization happens before the batch is
/// returned, so later stages only ever see hashed identifiers.
pub async fn extract<W>(
    warehouse: &W,
    template: &QueryTemplate,
    ctx: &RunContext,
    pseudonymizer: &Pseudonymizer,
    rules: &[PseudonymizeRule],
) -> EtlResult<RowBatch>
where
    W: Warehouse,
{
    let sql = template.render(ctx.partition_date());

    info!(
        warehouse = W::name(),
        partition_date = %ctx.partition_date(),
        "running extraction query"
    );

    let mut batch = warehouse.query(&sql).await?;

    info!(
        rows = batch.len(),
        columns = batch.columns().len(),
        "extraction query completed"
    );

    pseudonymizer.apply(&mut batch, rules)?;

    Ok(batch)
}
