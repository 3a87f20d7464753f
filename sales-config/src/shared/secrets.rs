use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

fn default_scope() -> String {
    SecretStoreConfig::DEFAULT_SCOPE.to_owned()
}

fn default_key() -> String {
    SecretStoreConfig::DEFAULT_KEY.to_owned()
}

pub(crate) fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

/// Configuration of the secret store holding the warehouse service-account key.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking the access token into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretStoreConfig {
    /// Base URL of the Databricks workspace, e.g. `https://adb-123.azuredatabricks.net`.
    ///
    /// Usually supplied through `DATABRICKS_HOST`.
    #[serde(default)]
    pub host: String,
    /// Personal access token used as bearer token.
    ///
    /// Usually supplied through `DATABRICKS_TOKEN`.
    #[serde(default = "empty_secret")]
    pub token: SecretString,
    /// Secret scope containing the service-account key.
    #[serde(default = "default_scope")]
    pub scope: String,
    /// Secret key under which the base64-encoded service-account JSON is stored.
    #[serde(default = "default_key")]
    pub key: String,
    /// Request timeout in seconds. Unset means no timeout beyond the HTTP client's own.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl SecretStoreConfig {
    pub const DEFAULT_SCOPE: &'static str = "ecp";
    pub const DEFAULT_KEY: &'static str = "gcp-sa-coe-databricks-key";

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::missing_with_hint(
                "secrets.host",
                " (set DATABRICKS_HOST)",
            ));
        }

        if self.token.expose_secret().trim().is_empty() {
            return Err(ValidationError::missing_with_hint(
                "secrets.token",
                " (set DATABRICKS_TOKEN)",
            ));
        }

        if self.scope.trim().is_empty() {
            return Err(ValidationError::missing("secrets.scope"));
        }

        if self.key.trim().is_empty() {
            return Err(ValidationError::missing("secrets.key"));
        }

        if self.timeout_secs == Some(0) {
            return Err(ValidationError::ZeroTimeout);
        }

        Ok(())
    }
}

/// Same as [`SecretStoreConfig`] but without the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretStoreConfigWithoutSecrets {
    pub host: String,
    pub scope: String,
    pub key: String,
    pub timeout_secs: Option<u64>,
}

impl From<SecretStoreConfig> for SecretStoreConfigWithoutSecrets {
    fn from(value: SecretStoreConfig) -> Self {
        SecretStoreConfigWithoutSecrets {
            host: value.host,
            scope: value.scope,
            key: value.key,
            timeout_secs: value.timeout_secs,
        }
    }
}
