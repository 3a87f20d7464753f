use sales_etl::error::{ErrorKind, EtlResult};
use sales_etl::partition::PartitionDate;
use sales_etl::query::{TableRef, delete_partition_statement};
use sales_etl::types::RowBatch;
use sales_etl::warehouse::{LoadOptions, Warehouse};
use tracing::{debug, info};

use gcp_bigquery_client::Client;

use crate::bigquery::client::{BigQueryApi, BigQueryClient, BigQueryProjectId};
use crate::encryption::install_crypto_provider;

/// A BigQuery-backed [`Warehouse`].
///
/// Source queries and partition deletes run as query jobs; appends stream through the
/// Storage Write API. The destination table is created from the batch schema on the
/// first load.
#[derive(Debug, Clone)]
pub struct BigQueryWarehouse<A = Client> {
    client: BigQueryClient<A>,
}

impl BigQueryWarehouse {
    /// Creates a warehouse authenticated with a service account key JSON string.
    ///
    /// Jobs are billed to `project_id`. `location` pins the region query jobs run in.
    pub async fn new_with_key(
        project_id: BigQueryProjectId,
        sa_key: &str,
        location: Option<String>,
    ) -> EtlResult<Self> {
        install_crypto_provider();

        let client = BigQueryClient::new_with_key(project_id, sa_key)
            .await?
            .with_location(location);

        Ok(Self { client })
    }
}

impl<A: BigQueryApi> Warehouse for BigQueryWarehouse<A> {
    fn name() -> &'static str {
        "bigquery"
    }

    async fn query(&self, sql: &str) -> EtlResult<RowBatch> {
        debug!(sql, "running source query");

        self.client.query(sql, ErrorKind::SourceQueryFailed).await
    }

    async fn delete_partition(
        &self,
        table: &TableRef,
        column: &str,
        date: PartitionDate,
    ) -> EtlResult<u64> {
        if !self.client.table_exists(table).await? {
            info!(%table, "destination table does not exist yet, nothing to delete");

            return Ok(0);
        }

        let statement = delete_partition_statement(table, column, date)?;
        debug!(sql = %statement, "deleting partition");

        self.client.execute(&statement).await
    }

    async fn append_rows(
        &self,
        table: &TableRef,
        batch: RowBatch,
        options: &LoadOptions,
    ) -> EtlResult<u64> {
        if !self.client.table_exists(table).await? {
            self.client
                .create_table(table, options.table_schema(&batch))
                .await?;
        }

        if batch.is_empty() {
            return Ok(0);
        }

        let (columns, rows) = batch.into_parts();
        let appended_rows = self.client.append_rows(table, &columns, rows).await?;

        debug!(%table, rows = appended_rows, "rows appended");

        Ok(appended_rows)
    }
}
