//! Core pipeline orchestrating one job run.
//!
//! A run is strictly sequential: extract the day's rows, transform them, delete the day's
//! partition from the destination and append the transformed rows. The first error aborts
//! the run and is returned as is; nothing is retried and no partial result is reported.

use std::fmt;
use tracing::info;

use crate::error::EtlResult;
use crate::extract::extract;
use crate::hashing::Pseudonymizer;
use crate::job::JobSpec;
use crate::load::load;
use crate::partition::{PartitionDate, RunContext};
use crate::query::TableRef;
use crate::warehouse::Warehouse;

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub job: String,
    pub destination: TableRef,
    pub partition_date: PartitionDate,
    pub extracted_rows: u64,
    pub deleted_rows: u64,
    pub loaded_rows: u64,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] extracted={} deleted={} loaded={}",
            self.destination,
            self.partition_date,
            self.extracted_rows,
            self.deleted_rows,
            self.loaded_rows
        )
    }
}

/// A job bound to the warehouse client of the current run.
///
/// The warehouse is owned by the pipeline and used for every call of the run.
#[derive(Debug)]
pub struct Pipeline<W> {
    job: JobSpec,
    warehouse: W,
    pseudonymizer: Pseudonymizer,
    destination: TableRef,
}

impl<W> Pipeline<W>
where
    W: Warehouse,
{
    /// Creates a pipeline loading `job` into `project`.`dataset`.
    pub fn new(
        job: JobSpec,
        warehouse: W,
        pseudonymizer: Pseudonymizer,
        project: &str,
        dataset: &str,
    ) -> Self {
        let destination = job.destination(project, dataset);

        Self {
            job,
            warehouse,
            pseudonymizer,
            destination,
        }
    }

    pub fn destination(&self) -> &TableRef {
        &self.destination
    }

    /// Runs the job for the partition described by `ctx`.
    ///
    /// The same context drives the extraction filter, the deletion filter and the
    /// `created_at` stamp.
    pub async fn run(&self, ctx: &RunContext) -> EtlResult<RunReport> {
        info!(
            job = %self.job.name,
            destination = %self.destination,
            partition_date = %ctx.partition_date(),
            "starting job run"
        );

        let batch = extract(
            &self.warehouse,
            &self.job.source_query,
            ctx,
            &self.pseudonymizer,
            &self.job.pseudonymize,
        )
        .await?;
        let extracted_rows = batch.len() as u64;

        let batch = self.job.transform.apply(batch, ctx)?;
        info!(
            rows = batch.len(),
            columns = batch.columns().len(),
            "transform completed"
        );

        let summary = load(
            &self.warehouse,
            &self.destination,
            &self.job.partition_column,
            batch,
            ctx,
            &self.job.load_options,
        )
        .await?;

        Ok(RunReport {
            job: self.job.name.clone(),
            destination: self.destination.clone(),
            partition_date: ctx.partition_date(),
            extracted_rows,
            deleted_rows: summary.deleted_rows,
            loaded_rows: summary.loaded_rows,
        })
    }
}
