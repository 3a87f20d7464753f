use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

fn default_project_id() -> String {
    WarehouseConfig::DEFAULT_PROJECT_ID.to_owned()
}

fn default_dataset_id() -> String {
    WarehouseConfig::DEFAULT_DATASET_ID.to_owned()
}

/// Destination of every job's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Google Cloud project that runs the queries and owns the destination dataset.
    #[serde(default = "default_project_id")]
    pub project_id: String,
    /// BigQuery dataset holding the destination tables.
    #[serde(default = "default_dataset_id")]
    pub dataset_id: String,
    /// Location used when polling query jobs, e.g. `US`.
    #[serde(default)]
    pub location: Option<String>,
}

impl WarehouseConfig {
    pub const DEFAULT_PROJECT_ID: &'static str = "telefonica-digitalsales";
    pub const DEFAULT_DATASET_ID: &'static str = "coe_testes";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.project_id.trim().is_empty() {
            return Err(ValidationError::missing("warehouse.project_id"));
        }

        if self.dataset_id.trim().is_empty() {
            return Err(ValidationError::missing("warehouse.dataset_id"));
        }

        Ok(())
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            dataset_id: default_dataset_id(),
            location: None,
        }
    }
}
