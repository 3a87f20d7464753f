use chrono::FixedOffset;
use sales_config::shared::{RunnerConfig, RunnerConfigWithoutSecrets};
use sales_destinations::bigquery::BigQueryWarehouse;
use sales_etl::hashing::Pseudonymizer;
use sales_etl::job::JobSpec;
use sales_etl::partition::{PartitionDate, RunContext};
use sales_etl::pipeline::{Pipeline, RunReport};
use sales_etl::secrets::SecretStoreClient;
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::RunnerResult;

/// Builds the run context from the optional `--date` override.
pub fn run_context(date: Option<PartitionDate>, offset: FixedOffset) -> RunContext {
    match date {
        Some(date) => RunContext::for_date(date, offset),
        None => RunContext::now(offset),
    }
}

/// Runs one job end to end against BigQuery.
///
/// Credentials are resolved from the secret store on every run; nothing is cached.
pub async fn run_job(
    config: RunnerConfig,
    job: JobSpec,
    ctx: RunContext,
) -> RunnerResult<RunReport> {
    log_config(&config);

    let secret_store = SecretStoreClient::new(
        config.secrets.host.clone(),
        config.secrets.token.clone(),
        config.secrets.timeout_secs.map(Duration::from_secs),
    )?;

    info!(
        scope = %config.secrets.scope,
        key = %config.secrets.key,
        "resolving warehouse credentials"
    );
    let credentials = secret_store
        .resolve_service_account(&config.secrets.scope, &config.secrets.key)
        .await?;
    info!(
        client_email = credentials.client_email().unwrap_or("unknown"),
        "warehouse credentials resolved"
    );

    let warehouse = BigQueryWarehouse::new_with_key(
        config.warehouse.project_id.clone(),
        credentials.key_json().expose_secret(),
        config.warehouse.location.clone(),
    )
    .await?;

    let pipeline = Pipeline::new(
        job,
        warehouse,
        Pseudonymizer::new(config.pseudonymization.salt.clone()),
        &config.warehouse.project_id,
        &config.warehouse.dataset_id,
    );

    Ok(pipeline.run(&ctx).await?)
}

fn log_config(config: &RunnerConfig) {
    let public = RunnerConfigWithoutSecrets::from(config.clone());
    match serde_json::to_string(&public) {
        Ok(json) => debug!(config = %json, "using runner config"),
        Err(err) => warn!(error = %err, "could not render runner config"),
    }
}
