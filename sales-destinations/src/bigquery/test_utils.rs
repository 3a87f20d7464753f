//! In-process stand-in for the BigQuery API used by client and warehouse tests.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use gcp_bigquery_client::error::{BQError, NestedResponseError, ResponseError};
use gcp_bigquery_client::google::cloud::bigquery::storage::v1::{
    AppendRowsResponse, RowError, append_rows_request,
};
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::get_query_results_response::GetQueryResultsResponse;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::QueryResponse;
use gcp_bigquery_client::storage::StreamName;
use serde_json::Value;

use crate::bigquery::client::BigQueryApi;

#[derive(Debug, Default)]
struct Inner {
    query_responses: VecDeque<QueryResponse>,
    query_results: VecDeque<GetQueryResultsResponse>,
    tables: HashSet<(String, String)>,
    reject_append_request: Option<usize>,
    queries: Vec<QueryRequest>,
    results_requests: Vec<(String, GetQueryResultsParameters)>,
    append_requests: Vec<(String, usize)>,
}

/// Scripted [`BigQueryApi`] that records every call it receives.
///
/// Responses are handed out in the order they were queued. Tables exist only after
/// [`FakeBigQueryApi::add_table`].
#[derive(Debug, Clone, Default)]
pub struct FakeBigQueryApi {
    inner: Arc<Mutex<Inner>>,
}

impl FakeBigQueryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a `jobs.query` response written in BigQuery's REST JSON.
    pub fn push_query_response(&self, response: Value) {
        let response = serde_json::from_value(response).unwrap();
        self.inner.lock().unwrap().query_responses.push_back(response);
    }

    /// Queues a `jobs.getQueryResults` response written in BigQuery's REST JSON.
    pub fn push_query_results(&self, response: Value) {
        let response = serde_json::from_value(response).unwrap();
        self.inner.lock().unwrap().query_results.push_back(response);
    }

    pub fn add_table(&self, dataset_id: &str, table_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .tables
            .insert((dataset_id.to_owned(), table_id.to_owned()));
    }

    /// Makes the append request with index `request` come back with a row error.
    pub fn reject_append_request(&self, request: usize) {
        self.inner.lock().unwrap().reject_append_request = Some(request);
    }

    /// SQL text of every `jobs.query` call.
    pub fn queries(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .queries
            .iter()
            .map(|request| request.query.clone())
            .collect()
    }

    /// Job id and parameters of every `jobs.getQueryResults` call.
    pub fn results_requests(&self) -> Vec<(String, GetQueryResultsParameters)> {
        self.inner.lock().unwrap().results_requests.clone()
    }

    /// Stream name and row count of every accepted append request.
    pub fn append_requests(&self) -> Vec<(String, usize)> {
        self.inner.lock().unwrap().append_requests.clone()
    }
}

fn not_found(message: String) -> BQError {
    BQError::ResponseError {
        error: ResponseError {
            error: NestedResponseError {
                code: 404,
                errors: vec![],
                message,
                status: "NOT_FOUND".to_owned(),
            },
        },
    }
}

impl BigQueryApi for FakeBigQueryApi {
    async fn query(
        &self,
        _project_id: &str,
        request: QueryRequest,
    ) -> Result<QueryResponse, BQError> {
        let mut inner = self.inner.lock().unwrap();
        inner.queries.push(request);

        Ok(inner
            .query_responses
            .pop_front()
            .expect("no jobs.query response queued"))
    }

    async fn get_query_results(
        &self,
        _project_id: &str,
        job_id: &str,
        parameters: GetQueryResultsParameters,
    ) -> Result<GetQueryResultsResponse, BQError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .results_requests
            .push((job_id.to_owned(), parameters));

        Ok(inner
            .query_results
            .pop_front()
            .expect("no jobs.getQueryResults response queued"))
    }

    async fn get_table(
        &self,
        _project_id: &str,
        dataset_id: &str,
        table_id: &str,
    ) -> Result<(), BQError> {
        let inner = self.inner.lock().unwrap();
        if inner
            .tables
            .contains(&(dataset_id.to_owned(), table_id.to_owned()))
        {
            Ok(())
        } else {
            Err(not_found(format!("Not found: Table {dataset_id}.{table_id}")))
        }
    }

    async fn append_rows(
        &self,
        stream_name: &StreamName,
        rows: append_rows_request::Rows,
        _trace_id: String,
    ) -> Result<Vec<AppendRowsResponse>, BQError> {
        let mut inner = self.inner.lock().unwrap();

        let request = inner.append_requests.len();
        if inner.reject_append_request == Some(request) {
            return Ok(vec![AppendRowsResponse {
                row_errors: vec![RowError {
                    index: 0,
                    message: "invalid value for column".to_owned(),
                    ..Default::default()
                }],
                ..Default::default()
            }]);
        }

        let append_rows_request::Rows::ProtoRows(data) = rows;
        let row_count = data
            .rows
            .map(|rows| rows.serialized_rows.len())
            .unwrap_or_default();
        inner
            .append_requests
            .push((stream_name.to_string(), row_count));

        Ok(vec![AppendRowsResponse::default()])
    }
}
