use gcp_bigquery_client::Client;
use gcp_bigquery_client::client_builder::ClientBuilder;
use gcp_bigquery_client::error::BQError;
use gcp_bigquery_client::google::cloud::bigquery::storage::v1::append_rows_response::Response;
use gcp_bigquery_client::google::cloud::bigquery::storage::v1::{
    AppendRowsResponse, RowError, append_rows_request,
};
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::get_query_results_response::GetQueryResultsResponse;
use gcp_bigquery_client::model::job_reference::JobReference;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::QueryResponse;
use gcp_bigquery_client::model::table_field_schema::TableFieldSchema;
use gcp_bigquery_client::model::table_row::TableRow as BigQueryResultRow;
use gcp_bigquery_client::storage::{StorageApi, StreamName, TableDescriptor};
use gcp_bigquery_client::yup_oauth2::parse_service_account_key;
use sales_etl::error::{ErrorKind, EtlError, EtlResult};
use sales_etl::etl_error;
use sales_etl::query::{TableRef, quote_column};
use sales_etl::types::{Cell, ColumnSchema, RowBatch, TableRow};
use std::fmt;
use std::future::Future;
use tracing::{debug, error, info};

use crate::bigquery::encoding::{
    BigQueryTableRow, field_type_to_column_type, json_to_cell, table_descriptor,
};

/// Trace identifier attached to Storage Write API requests.
const SALES_ETL_TRACE_ID: &str = "sales-etl BigQueryClient";

/// Upper bound for the encoded rows of one append request.
///
/// The AppendRows API caps a request at 10MB including request metadata.
const MAX_APPEND_REQUEST_BYTES: usize = 9 * 1024 * 1024;

/// How long one `jobs.query` or `jobs.getQueryResults` call waits for the job to finish.
const QUERY_WAIT_TIMEOUT_MS: i32 = 60_000;

/// BigQuery project identifier.
pub type BigQueryProjectId = String;

/// The BigQuery REST and Storage Write API calls [`BigQueryClient`] is built on.
///
/// Implemented for [`Client`]. Every call is issued once; retries are left to the caller.
pub trait BigQueryApi: Send + Sync {
    /// Starts a query job through `jobs.query`.
    fn query(
        &self,
        project_id: &str,
        request: QueryRequest,
    ) -> impl Future<Output = Result<QueryResponse, BQError>> + Send;

    /// Polls a query job or fetches one of its result pages through `jobs.getQueryResults`.
    fn get_query_results(
        &self,
        project_id: &str,
        job_id: &str,
        parameters: GetQueryResultsParameters,
    ) -> impl Future<Output = Result<GetQueryResultsResponse, BQError>> + Send;

    /// Looks a table up through `tables.get`.
    fn get_table(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> impl Future<Output = Result<(), BQError>> + Send;

    /// Sends one append request to a write stream and collects every response.
    fn append_rows(
        &self,
        stream_name: &StreamName,
        rows: append_rows_request::Rows,
        trace_id: String,
    ) -> impl Future<Output = Result<Vec<AppendRowsResponse>, BQError>> + Send;
}

impl BigQueryApi for Client {
    async fn query(
        &self,
        project_id: &str,
        request: QueryRequest,
    ) -> Result<QueryResponse, BQError> {
        self.job().query(project_id, request).await
    }

    async fn get_query_results(
        &self,
        project_id: &str,
        job_id: &str,
        parameters: GetQueryResultsParameters,
    ) -> Result<GetQueryResultsResponse, BQError> {
        self.job()
            .get_query_results(project_id, job_id, parameters)
            .await
    }

    async fn get_table(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<(), BQError> {
        self.table()
            .get(project_id, dataset_id, table_id, None)
            .await
            .map(|_| ())
    }

    async fn append_rows(
        &self,
        stream_name: &StreamName,
        rows: append_rows_request::Rows,
        trace_id: String,
    ) -> Result<Vec<AppendRowsResponse>, BQError> {
        let mut storage = self.storage().clone();
        let mut stream = storage.append_rows(stream_name, rows, trace_id).await?;

        let mut responses = Vec::new();
        while let Some(response) = stream.message().await? {
            responses.push(response);
        }

        Ok(responses)
    }
}

/// Converts BigQuery errors to ETL errors of kind `kind`.
///
/// Authentication failures are reported as [`ErrorKind::AuthenticationError`] regardless
/// of the operation that triggered them.
fn bq_error_to_etl_error(err: BQError, kind: ErrorKind) -> EtlError {
    let (kind, description) = match &err {
        BQError::InvalidServiceAccountKey(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account key",
        ),
        BQError::InvalidServiceAccountAuthenticator(_) => (
            ErrorKind::AuthenticationError,
            "Invalid BigQuery service account authenticator",
        ),
        BQError::AuthError(_) => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication error",
        ),
        BQError::YupAuthError(_) => (
            ErrorKind::AuthenticationError,
            "BigQuery OAuth authentication error",
        ),
        BQError::NoToken => (
            ErrorKind::AuthenticationError,
            "BigQuery authentication token missing",
        ),
        BQError::RequestError(_) => (kind, "BigQuery request failed"),
        BQError::ResponseError { .. } => (kind, "BigQuery response error"),
        BQError::SerializationError(_) => (
            ErrorKind::SerializationError,
            "BigQuery JSON serialization error",
        ),
        _ => (kind, "BigQuery operation failed"),
    };

    etl_error!(kind, description, err.to_string())
}

/// Converts BigQuery row errors to ETL load errors.
fn row_error_to_etl_error(err: &RowError) -> EtlError {
    etl_error!(
        ErrorKind::DestinationLoadFailed,
        "BigQuery row error",
        format!("row {}: {}", err.index, err.message)
    )
}

/// Fails on the first row error or stream error of an append response.
fn process_append_response(response: AppendRowsResponse) -> EtlResult<()> {
    if let Some(row_error) = response.row_errors.first() {
        error!(
            error_count = response.row_errors.len(),
            "append request has row errors"
        );

        return Err(row_error_to_etl_error(row_error));
    }

    if let Some(Response::Error(status)) = response.response {
        return Err(etl_error!(
            ErrorKind::DestinationLoadFailed,
            "BigQuery append request failed",
            format!("code {}: {}", status.code, status.message)
        ));
    }

    Ok(())
}

/// Reads the column layout of a result set.
fn result_columns(fields: &[TableFieldSchema]) -> Vec<ColumnSchema> {
    fields
        .iter()
        .map(|field| {
            ColumnSchema::new(
                field.name.clone(),
                field_type_to_column_type(&field.r#type),
            )
        })
        .collect()
}

/// Decodes one page of result rows against `columns`.
fn decode_rows(
    columns: &[ColumnSchema],
    rows: Vec<BigQueryResultRow>,
) -> EtlResult<Vec<TableRow>> {
    rows.into_iter()
        .map(|row| {
            let cells = row.columns.unwrap_or_default();
            let values = columns
                .iter()
                .enumerate()
                .map(|(index, column)| {
                    let value = cells.get(index).and_then(|cell| cell.value.as_ref());
                    json_to_cell(value, column.typ)
                })
                .collect::<EtlResult<Vec<Cell>>>()?;

            Ok(TableRow::new(values))
        })
        .collect()
}

/// Client for interacting with Google BigQuery.
///
/// Queries run as standard SQL jobs billed to the client's project. Appends go through the
/// Storage Write API default stream of the target table.
#[derive(Clone)]
pub struct BigQueryClient<A = Client> {
    project_id: BigQueryProjectId,
    location: Option<String>,
    api: A,
}

impl BigQueryClient {
    /// Creates a new [`BigQueryClient`] from a service account key JSON string.
    pub async fn new_with_key(
        project_id: BigQueryProjectId,
        sa_key: &str,
    ) -> EtlResult<BigQueryClient> {
        let sa_key = parse_service_account_key(sa_key)
            .map_err(BQError::from)
            .map_err(|err| bq_error_to_etl_error(err, ErrorKind::AuthenticationError))?;
        let client = ClientBuilder::new()
            .build_from_service_account_key(sa_key, false)
            .await
            .map_err(|err| bq_error_to_etl_error(err, ErrorKind::AuthenticationError))?;

        Ok(BigQueryClient::with_api(project_id, client))
    }
}

impl<A: BigQueryApi> BigQueryClient<A> {
    /// Creates a client that issues its calls through `api`.
    pub fn with_api(project_id: BigQueryProjectId, api: A) -> Self {
        Self {
            project_id,
            location: None,
            api,
        }
    }

    /// Sets the location query jobs run in.
    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    fn query_request(&self, sql: &str) -> QueryRequest {
        let mut request = QueryRequest::new(sql);
        request.location = self.location.clone();
        request.timeout_ms = Some(QUERY_WAIT_TIMEOUT_MS);

        request
    }

    /// Returns the location `getQueryResults` must be called with for `job_reference`.
    ///
    /// The job's own location wins over the configured one, which is unset when BigQuery
    /// picks the region.
    fn job_location(&self, job_reference: Option<&JobReference>) -> Option<String> {
        job_reference
            .and_then(|reference| reference.location.clone())
            .or_else(|| self.location.clone())
    }

    /// Runs `sql` and materializes every page of its result.
    ///
    /// Waits for the job to complete when the first response comes back before it has
    /// finished, then follows page tokens until the result is exhausted.
    pub async fn query(&self, sql: &str, error_kind: ErrorKind) -> EtlResult<RowBatch> {
        let response = self
            .api
            .query(&self.project_id, self.query_request(sql))
            .await
            .map_err(|err| bq_error_to_etl_error(err, error_kind))?;

        let mut job_complete = response.job_complete.unwrap_or(false);
        let mut schema = response.schema;
        let mut page_rows = response.rows;
        let mut page_token = response.page_token;
        let job_reference = response.job_reference;

        let mut columns = None;
        let mut rows = Vec::new();
        let mut pages = 0;

        loop {
            if job_complete {
                if columns.is_none() {
                    let fields = schema
                        .take()
                        .and_then(|schema| schema.fields)
                        .unwrap_or_default();
                    columns = Some(result_columns(&fields));
                }

                if let (Some(columns), Some(page)) = (&columns, page_rows.take()) {
                    rows.extend(decode_rows(columns, page)?);
                    pages += 1;
                }

                if page_token.is_none() {
                    break;
                }
            }

            let Some(job_id) = job_reference
                .as_ref()
                .and_then(|reference| reference.job_id.clone())
            else {
                return Err(etl_error!(
                    error_kind,
                    "BigQuery query response has no job reference",
                    "cannot fetch the remaining result pages"
                ));
            };

            let parameters = GetQueryResultsParameters {
                location: self.job_location(job_reference.as_ref()),
                page_token: page_token.take(),
                timeout_ms: Some(QUERY_WAIT_TIMEOUT_MS),
                ..Default::default()
            };

            debug!(%job_id, pages, "fetching query results");

            let response = self
                .api
                .get_query_results(&self.project_id, &job_id, parameters)
                .await
                .map_err(|err| bq_error_to_etl_error(err, error_kind))?;

            job_complete = response.job_complete.unwrap_or(false);
            if schema.is_none() {
                schema = response.schema;
            }
            page_rows = response.rows;
            page_token = response.page_token;
        }

        let columns = columns.unwrap_or_default();
        debug!(rows = rows.len(), pages, "query results fetched");

        RowBatch::new(columns, rows)
    }

    /// Runs a DML or DDL statement and returns the number of affected rows.
    ///
    /// Statements without an affected row count, such as DDL, yield `0`.
    pub async fn execute(&self, sql: &str) -> EtlResult<u64> {
        let response = self
            .api
            .query(&self.project_id, self.query_request(sql))
            .await
            .map_err(|err| bq_error_to_etl_error(err, ErrorKind::DestinationQueryFailed))?;

        let mut affected_rows = response.num_dml_affected_rows;
        if response.job_complete != Some(true) {
            let job_reference = response.job_reference.as_ref();
            let job_id = job_reference
                .and_then(|reference| reference.job_id.clone())
                .ok_or_else(|| {
                    etl_error!(
                        ErrorKind::DestinationQueryFailed,
                        "BigQuery statement response has no job reference"
                    )
                })?;
            let location = self.job_location(job_reference);

            loop {
                debug!(%job_id, "waiting for statement to complete");

                let parameters = GetQueryResultsParameters {
                    location: location.clone(),
                    timeout_ms: Some(QUERY_WAIT_TIMEOUT_MS),
                    ..Default::default()
                };
                let response = self
                    .api
                    .get_query_results(&self.project_id, &job_id, parameters)
                    .await
                    .map_err(|err| {
                        bq_error_to_etl_error(err, ErrorKind::DestinationQueryFailed)
                    })?;

                if response.job_complete == Some(true) {
                    affected_rows = response.num_dml_affected_rows;
                    break;
                }
            }
        }

        match affected_rows {
            Some(count) => count.parse::<u64>().map_err(|err| {
                etl_error!(
                    ErrorKind::InvalidData,
                    "BigQuery returned an invalid affected row count",
                    format!("'{count}': {err}")
                )
            }),
            None => Ok(0),
        }
    }

    /// Checks whether a table exists.
    pub async fn table_exists(&self, table: &TableRef) -> EtlResult<bool> {
        let result = self
            .api
            .get_table(&table.project, &table.dataset, &table.table)
            .await;

        match result {
            Ok(()) => Ok(true),
            Err(BQError::ResponseError { error }) if error.error.code == 404 => Ok(false),
            Err(err) => Err(bq_error_to_etl_error(err, ErrorKind::DestinationQueryFailed)),
        }
    }

    /// Creates `table` with `columns`, all nullable.
    pub async fn create_table(
        &self,
        table: &TableRef,
        columns: &[ColumnSchema],
    ) -> EtlResult<()> {
        let full_table_name = table.quoted()?;
        let columns_spec = create_columns_spec(columns)?;

        info!(%full_table_name, "creating table in bigquery");

        let query = format!("create table if not exists {full_table_name} {columns_spec}");
        let _ = self.execute(&query).await?;

        Ok(())
    }

    /// Appends `rows`, laid out as `columns`, to the default stream of `table`.
    ///
    /// Rows are sent in sequential requests of at most [`MAX_APPEND_REQUEST_BYTES`]. The
    /// default stream commits each request as soon as it is acknowledged, so a failure
    /// leaves the rows of earlier requests in the table.
    pub async fn append_rows(
        &self,
        table: &TableRef,
        columns: &[ColumnSchema],
        rows: Vec<TableRow>,
    ) -> EtlResult<u64> {
        let stream_name = StreamName::new_default(
            table.project.clone(),
            table.dataset.clone(),
            table.table.clone(),
        );
        let rows: Vec<BigQueryTableRow> = rows.into_iter().map(BigQueryTableRow::from).collect();

        self.append_in_requests(
            &stream_name,
            &table_descriptor(columns),
            &rows,
            MAX_APPEND_REQUEST_BYTES,
        )
        .await
    }

    async fn append_in_requests(
        &self,
        stream_name: &StreamName,
        descriptor: &TableDescriptor,
        rows: &[BigQueryTableRow],
        max_request_bytes: usize,
    ) -> EtlResult<u64> {
        let mut remaining = rows;
        let mut appended_rows = 0;
        let mut requests = 0;

        while !remaining.is_empty() {
            let (encoded, row_count) =
                StorageApi::create_rows(descriptor, remaining, max_request_bytes);
            if row_count == 0 {
                return Err(etl_error!(
                    ErrorKind::DestinationLoadFailed,
                    "Row exceeds the append request size limit",
                    format!("limit is {max_request_bytes} bytes")
                ));
            }

            let responses = self
                .api
                .append_rows(stream_name, encoded, SALES_ETL_TRACE_ID.to_owned())
                .await
                .map_err(|err| bq_error_to_etl_error(err, ErrorKind::DestinationLoadFailed))?;
            for response in responses {
                process_append_response(response)?;
            }

            appended_rows += row_count as u64;
            requests += 1;
            remaining = &remaining[row_count..];

            debug!(requests, appended_rows, "append request acknowledged");
        }

        Ok(appended_rows)
    }
}

fn create_columns_spec(columns: &[ColumnSchema]) -> EtlResult<String> {
    let spec = columns
        .iter()
        .map(|column| -> EtlResult<String> {
            Ok(format!(
                "{} {}",
                quote_column(&column.name)?,
                column.typ.sql_name()
            ))
        })
        .collect::<EtlResult<Vec<_>>>()?
        .join(",");

    Ok(format!("({spec})"))
}

impl<A> fmt::Debug for BigQueryClient<A> {
    /// Formats the client for debugging, excluding sensitive client details.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigquery::test_utils::FakeBigQueryApi;
    use sales_etl::types::ColumnType;
    use serde_json::json;

    const PROJECT: &str = "telefonica-digitalsales";

    fn client(api: &FakeBigQueryApi) -> BigQueryClient<FakeBigQueryApi> {
        BigQueryClient::with_api(PROJECT.to_owned(), api.clone())
    }

    fn job_reference(location: &str) -> serde_json::Value {
        json!({ "projectId": PROJECT, "jobId": "job_1", "location": location })
    }

    fn result_schema() -> serde_json::Value {
        json!({ "fields": [
            { "name": "pedido", "type": "STRING" },
            { "name": "quantidade", "type": "INTEGER" }
        ] })
    }

    #[tokio::test]
    async fn test_query_follows_page_tokens() {
        let api = FakeBigQueryApi::new();
        api.push_query_response(json!({
            "jobComplete": true,
            "jobReference": job_reference("southamerica-east1"),
            "schema": result_schema(),
            "rows": [{ "f": [{ "v": "P-1" }, { "v": "1" }] }],
            "pageToken": "page-2"
        }));
        api.push_query_results(json!({
            "jobComplete": true,
            "rows": [{ "f": [{ "v": "P-2" }, { "v": "2" }] }, { "f": [{ "v": "P-3" }, { "v": null }] }]
        }));

        let batch = client(&api)
            .query("select 1", ErrorKind::SourceQueryFailed)
            .await
            .unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.column("quantidade").unwrap().typ, ColumnType::Int64);
        assert_eq!(
            batch.column_values("pedido").unwrap().cloned().collect::<Vec<_>>(),
            vec![
                Cell::String("P-1".to_owned()),
                Cell::String("P-2".to_owned()),
                Cell::String("P-3".to_owned()),
            ]
        );

        let requests = api.results_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "job_1");
        assert_eq!(requests[0].1.page_token.as_deref(), Some("page-2"));
    }

    #[tokio::test]
    async fn test_query_waits_for_incomplete_job() {
        let api = FakeBigQueryApi::new();
        api.push_query_response(json!({
            "jobComplete": false,
            "jobReference": job_reference("southamerica-east1")
        }));
        api.push_query_results(json!({ "jobComplete": false }));
        api.push_query_results(json!({
            "jobComplete": true,
            "schema": result_schema(),
            "rows": [{ "f": [{ "v": "P-1" }, { "v": "7" }] }]
        }));

        let batch = client(&api)
            .query("select 1", ErrorKind::SourceQueryFailed)
            .await
            .unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch.column_values("quantidade").unwrap().cloned().collect::<Vec<_>>(),
            vec![Cell::I64(7)]
        );
        assert_eq!(api.results_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_query_with_no_rows_keeps_the_schema() {
        let api = FakeBigQueryApi::new();
        api.push_query_response(json!({
            "jobComplete": true,
            "jobReference": job_reference("US"),
            "schema": result_schema()
        }));

        let batch = client(&api)
            .query("select 1", ErrorKind::SourceQueryFailed)
            .await
            .unwrap();

        assert!(batch.is_empty());
        assert_eq!(batch.columns().len(), 2);
        assert!(api.results_requests().is_empty());
    }

    #[tokio::test]
    async fn test_execute_polls_with_the_job_location() {
        let api = FakeBigQueryApi::new();
        api.push_query_response(json!({
            "jobComplete": false,
            "jobReference": job_reference("southamerica-east1")
        }));
        api.push_query_results(json!({ "jobComplete": false }));
        api.push_query_results(json!({ "jobComplete": true, "numDmlAffectedRows": "42" }));

        let deleted = client(&api).execute("delete from t where true").await.unwrap();

        assert_eq!(deleted, 42);
        let requests = api.results_requests();
        assert_eq!(requests.len(), 2);
        for (job_id, parameters) in requests {
            assert_eq!(job_id, "job_1");
            assert_eq!(parameters.location.as_deref(), Some("southamerica-east1"));
        }
    }

    #[tokio::test]
    async fn test_execute_prefers_job_location_over_configured_one() {
        let api = FakeBigQueryApi::new();
        api.push_query_response(json!({
            "jobComplete": false,
            "jobReference": job_reference("southamerica-east1")
        }));
        api.push_query_results(json!({ "jobComplete": true, "numDmlAffectedRows": "0" }));

        client(&api)
            .with_location(Some("US".to_owned()))
            .execute("delete from t where true")
            .await
            .unwrap();

        assert_eq!(
            api.results_requests()[0].1.location.as_deref(),
            Some("southamerica-east1")
        );
    }

    #[tokio::test]
    async fn test_execute_without_affected_rows_is_zero() {
        let api = FakeBigQueryApi::new();
        api.push_query_response(json!({
            "jobComplete": true,
            "jobReference": job_reference("US")
        }));

        let affected = client(&api).execute("create table t (a STRING)").await.unwrap();

        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_execute_rejects_invalid_affected_row_count() {
        let api = FakeBigQueryApi::new();
        api.push_query_response(json!({
            "jobComplete": true,
            "jobReference": job_reference("US"),
            "numDmlAffectedRows": "many"
        }));

        let err = client(&api).execute("delete from t where true").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_table_exists_treats_not_found_as_missing() {
        let api = FakeBigQueryApi::new();
        api.add_table("coe_testes", "existing");
        let client = client(&api);

        let existing = TableRef::new(PROJECT, "coe_testes", "existing");
        let missing = TableRef::new(PROJECT, "coe_testes", "missing");

        assert!(client.table_exists(&existing).await.unwrap());
        assert!(!client.table_exists(&missing).await.unwrap());
    }

    fn rows(count: usize) -> Vec<TableRow> {
        (0..count)
            .map(|index| TableRow::new(vec![Cell::String(format!("P-{index:04}"))]))
            .collect()
    }

    fn single_row_bytes() -> usize {
        use prost::Message;

        BigQueryTableRow::from(rows(1).remove(0)).encode_to_vec().len()
    }

    #[tokio::test]
    async fn test_append_splits_rows_into_sequential_requests() {
        let api = FakeBigQueryApi::new();
        let table = TableRef::new(PROJECT, "coe_testes", "vendas");
        let columns = [ColumnSchema::new("pedido", ColumnType::String)];
        let stream_name = StreamName::new_default(
            table.project.clone(),
            table.dataset.clone(),
            table.table.clone(),
        );
        let encoded: Vec<BigQueryTableRow> =
            rows(5).into_iter().map(BigQueryTableRow::from).collect();

        let appended = client(&api)
            .append_in_requests(
                &stream_name,
                &table_descriptor(&columns),
                &encoded,
                single_row_bytes() * 2,
            )
            .await
            .unwrap();

        assert_eq!(appended, 5);
        let requests = api.append_requests();
        assert_eq!(
            requests.iter().map(|(_, count)| *count).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert_eq!(
            requests[0].0,
            "projects/telefonica-digitalsales/datasets/coe_testes/tables/vendas/streams/_default"
        );
    }

    #[tokio::test]
    async fn test_append_failure_keeps_earlier_requests_committed() {
        let api = FakeBigQueryApi::new();
        api.reject_append_request(1);
        let columns = [ColumnSchema::new("pedido", ColumnType::String)];
        let stream_name = StreamName::new_default(
            PROJECT.to_owned(),
            "coe_testes".to_owned(),
            "vendas".to_owned(),
        );
        let encoded: Vec<BigQueryTableRow> =
            rows(4).into_iter().map(BigQueryTableRow::from).collect();

        let err = client(&api)
            .append_in_requests(
                &stream_name,
                &table_descriptor(&columns),
                &encoded,
                single_row_bytes() * 2,
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationLoadFailed);
        assert_eq!(api.append_requests().len(), 1);
        assert_eq!(api.append_requests()[0].1, 2);
    }

    #[tokio::test]
    async fn test_append_rejects_row_larger_than_request_limit() {
        let api = FakeBigQueryApi::new();
        let columns = [ColumnSchema::new("pedido", ColumnType::String)];
        let stream_name = StreamName::new_default(
            PROJECT.to_owned(),
            "coe_testes".to_owned(),
            "vendas".to_owned(),
        );
        let encoded: Vec<BigQueryTableRow> =
            rows(1).into_iter().map(BigQueryTableRow::from).collect();

        let err = client(&api)
            .append_in_requests(&stream_name, &table_descriptor(&columns), &encoded, 1)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationLoadFailed);
        assert!(api.append_requests().is_empty());
    }

    #[test]
    fn test_create_columns_spec() {
        let spec = create_columns_spec(&[
            ColumnSchema::new("pedido", ColumnType::String),
            ColumnSchema::new("data_pedido_ajustada", ColumnType::Date),
            ColumnSchema::new("created_at", ColumnType::DateTime),
        ])
        .unwrap();

        assert_eq!(
            spec,
            "(`pedido` STRING,`data_pedido_ajustada` DATE,`created_at` DATETIME)"
        );
    }

    #[test]
    fn test_create_columns_spec_rejects_invalid_names() {
        let err = create_columns_spec(&[ColumnSchema::new("", ColumnType::String)]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DestinationTableNameInvalid);
    }

    #[test]
    fn test_missing_token_is_an_authentication_error() {
        let err = bq_error_to_etl_error(BQError::NoToken, ErrorKind::SourceQueryFailed);

        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
    }

    #[test]
    fn test_decode_rows_fills_missing_cells_with_null() {
        let columns = vec![
            ColumnSchema::new("pedido", ColumnType::String),
            ColumnSchema::new("quantidade", ColumnType::Int64),
        ];
        let rows: Vec<BigQueryResultRow> = serde_json::from_value(json!([
            { "f": [{ "v": "P-1" }, { "v": "3" }] },
            { "f": [{ "v": "P-2" }] }
        ]))
        .unwrap();

        let decoded = decode_rows(&columns, rows).unwrap();

        assert_eq!(
            decoded,
            vec![
                TableRow::new(vec![Cell::String("P-1".to_owned()), Cell::I64(3)]),
                TableRow::new(vec![Cell::String("P-2".to_owned()), Cell::Null]),
            ]
        );
    }
}
