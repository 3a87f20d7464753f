use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    PseudonymizationConfig, SecretStoreConfig, SecretStoreConfigWithoutSecrets, TimezoneConfig,
    ValidationError, WarehouseConfig,
};

/// Complete configuration of the job runner.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Secret store holding the warehouse credentials.
    pub secrets: SecretStoreConfig,
    /// Warehouse project and dataset the jobs load into.
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    /// Salt for identifier pseudonymization.
    pub pseudonymization: PseudonymizationConfig,
    /// Offset defining "today" for the run.
    #[serde(default)]
    pub timezone: TimezoneConfig,
}

impl RunnerConfig {
    /// Validates the complete runner configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.secrets.validate()?;
        self.warehouse.validate()?;
        self.pseudonymization.validate()?;
        self.timezone.validate()
    }
}

impl Config for RunnerConfig {
    const ENV_OVERRIDES: &'static [(&'static str, &'static str)] = &[
        ("DATABRICKS_HOST", "secrets.host"),
        ("DATABRICKS_TOKEN", "secrets.token"),
    ];
}

/// Same as [`RunnerConfig`] but without secrets.
///
/// This type implements [`Serialize`] because it does not contain secrets,
/// so it is safe to log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfigWithoutSecrets {
    pub secrets: SecretStoreConfigWithoutSecrets,
    pub warehouse: WarehouseConfig,
    pub timezone: TimezoneConfig,
}

impl From<RunnerConfig> for RunnerConfigWithoutSecrets {
    fn from(value: RunnerConfig) -> Self {
        RunnerConfigWithoutSecrets {
            secrets: value.secrets.into(),
            warehouse: value.warehouse,
            timezone: value.timezone,
        }
    }
}
