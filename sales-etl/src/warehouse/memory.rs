use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::partition::PartitionDate;
use crate::query::TableRef;
use crate::types::{Cell, RowBatch, TableRow};
use crate::warehouse::{LoadOptions, Warehouse};

/// A recorded [`Warehouse::delete_partition`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub table: TableRef,
    pub column: String,
    pub date: PartitionDate,
    pub deleted_rows: u64,
}

#[derive(Debug, Default)]
struct Inner {
    query_result: Option<RowBatch>,
    queries: Vec<String>,
    deletes: Vec<DeleteCall>,
    tables: HashMap<TableRef, RowBatch>,
}

/// In-memory warehouse for testing and development purposes.
///
/// [`MemoryWarehouse`] cannot evaluate SQL. Every query returns the snapshot configured
/// with [`MemoryWarehouse::set_query_result`] and the SQL text is recorded so tests can
/// inspect it. Destination tables live in a map and support the partition delete and
/// append operations a job performs.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch returned by every subsequent query.
    pub async fn set_query_result(&self, batch: RowBatch) {
        let mut inner = self.inner.lock().await;
        inner.query_result = Some(batch);
    }

    /// Replaces the contents of a destination table.
    pub async fn insert_table(&self, table: TableRef, batch: RowBatch) {
        let mut inner = self.inner.lock().await;
        inner.tables.insert(table, batch);
    }

    /// Returns a copy of a destination table, if it exists.
    pub async fn table(&self, table: &TableRef) -> Option<RowBatch> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).cloned()
    }

    /// Returns every SQL text submitted through [`Warehouse::query`], in order.
    pub async fn queries(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.queries.clone()
    }

    /// Returns every partition delete performed, in order.
    pub async fn deletes(&self) -> Vec<DeleteCall> {
        let inner = self.inner.lock().await;
        inner.deletes.clone()
    }
}

/// Returns `true` if `cell` holds the partition value `date`.
fn matches_partition(cell: &Cell, date: PartitionDate) -> bool {
    match cell {
        Cell::Date(value) => *value == date.date(),
        Cell::String(value) => *value == date.to_string(),
        _ => false,
    }
}

impl Warehouse for MemoryWarehouse {
    fn name() -> &'static str {
        "memory"
    }

    async fn query(&self, sql: &str) -> EtlResult<RowBatch> {
        let mut inner = self.inner.lock().await;

        info!("running query against memory warehouse");
        inner.queries.push(sql.to_owned());

        match &inner.query_result {
            Some(batch) => Ok(batch.clone()),
            None => bail!(
                ErrorKind::SourceQueryFailed,
                "Memory warehouse has no query result configured"
            ),
        }
    }

    async fn delete_partition(
        &self,
        table: &TableRef,
        column: &str,
        date: PartitionDate,
    ) -> EtlResult<u64> {
        let mut inner = self.inner.lock().await;

        let deleted_rows = match inner.tables.get_mut(table) {
            Some(stored) => {
                let Some(index) = stored.find_column(column) else {
                    bail!(
                        ErrorKind::DestinationQueryFailed,
                        "Partition column does not exist in destination table",
                        format!("{table}: {column}")
                    );
                };

                let before = stored.len();
                stored.retain_rows(|row| !matches_partition(&row.values()[index], date));

                (before - stored.len()) as u64
            }
            None => 0,
        };

        info!(%table, %date, deleted_rows, "deleted partition from memory warehouse");

        inner.deletes.push(DeleteCall {
            table: table.clone(),
            column: column.to_owned(),
            date,
            deleted_rows,
        });

        Ok(deleted_rows)
    }

    async fn append_rows(
        &self,
        table: &TableRef,
        batch: RowBatch,
        options: &LoadOptions,
    ) -> EtlResult<u64> {
        let mut inner = self.inner.lock().await;

        if !inner.tables.contains_key(table) {
            let columns = options.table_schema(&batch).to_vec();
            inner.tables.insert(table.clone(), RowBatch::empty(columns)?);
        }

        let Some(stored) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::InvalidState,
                "Destination table vanished during append",
                table
            );
        };

        // Rows are aligned to the stored table's column order by name.
        let mut positions = Vec::with_capacity(stored.columns().len());
        for column in stored.columns() {
            positions.push(batch.find_column(&column.name));
        }

        for column in batch.columns() {
            match stored.find_column(&column.name) {
                Some(index) if stored.columns()[index].typ == column.typ => {}
                Some(index) => bail!(
                    ErrorKind::DestinationLoadFailed,
                    "Column type does not match destination table",
                    format!(
                        "{table}.{}: expected {}, got {}",
                        column.name,
                        stored.columns()[index].typ,
                        column.typ
                    )
                ),
                None => bail!(
                    ErrorKind::DestinationLoadFailed,
                    "Column does not exist in destination table",
                    format!("{table}.{}", column.name)
                ),
            }
        }

        let appended_rows = batch.len() as u64;
        let (_, rows) = batch.into_parts();
        for row in rows {
            let values = row.into_values();
            let aligned = positions
                .iter()
                .map(|position| match position {
                    Some(index) => values[*index].clone(),
                    None => Cell::Null,
                })
                .collect();

            stored.push_row(TableRow::new(aligned))?;
        }

        info!(%table, appended_rows, "appended rows to memory warehouse");

        Ok(appended_rows)
    }
}
