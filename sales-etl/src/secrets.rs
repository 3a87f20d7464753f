//! Credential resolution against the Databricks secrets API.
//!
//! The warehouse service-account key is stored as a Databricks secret. A run fetches it
//! exactly once with `GET {host}/api/2.0/secrets/get?scope=..&key=..`, decodes the base64
//! payload and parses it as a JSON object. Nothing is cached and nothing is retried.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

const SECRETS_GET_PATH: &str = "/api/2.0/secrets/get";

/// Body returned by the secrets `get` endpoint.
#[derive(Debug, Deserialize)]
struct GetSecretResponse {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

/// Client for the Databricks secrets API.
#[derive(Clone)]
pub struct SecretStoreClient {
    client: reqwest::Client,
    host: String,
    token: SecretString,
}

impl SecretStoreClient {
    /// Creates a client for `host` authenticated with a bearer `token`.
    ///
    /// Without a `timeout` requests wait as long as the HTTP client allows.
    pub fn new(
        host: impl Into<String>,
        token: SecretString,
        timeout: Option<Duration>,
    ) -> EtlResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let host = host.into();
        let host = host.trim_end_matches('/').to_owned();

        Ok(Self {
            client: builder.build()?,
            host,
            token,
        })
    }

    /// Fetches the secret stored under `scope`/`key` and returns its decoded text.
    pub async fn get_secret(&self, scope: &str, key: &str) -> EtlResult<SecretString> {
        let url = format!("{}{SECRETS_GET_PATH}", self.host);

        debug!(%scope, %key, "requesting secret from secret store");

        let response = self
            .client
            .get(&url)
            .bearer_auth(self.token.expose_secret())
            .query(&[("scope", scope), ("key", key)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            error!(%status, %scope, %key, "secret store request failed");

            bail!(
                ErrorKind::SecretStoreRequestFailed,
                "Secret store returned an error status",
                format!("status {status}: {body}")
            );
        }

        let body = response.text().await?;
        let response: GetSecretResponse = match serde_json::from_str(&body) {
            Ok(response) => response,
            Err(err) => bail!(
                ErrorKind::SecretStoreResponseInvalid,
                "Secret store response is not valid JSON",
                err,
                source: err
            ),
        };

        if let Some(returned_key) = response.key.as_deref() {
            if returned_key != key {
                bail!(
                    ErrorKind::SecretStoreResponseInvalid,
                    "Secret store returned a different key",
                    format!("requested '{key}', received '{returned_key}'")
                );
            }
        }

        let Some(encoded) = response.value else {
            bail!(
                ErrorKind::SecretStoreResponseInvalid,
                "Secret store response has no value",
                format!("scope '{scope}', key '{key}'")
            );
        };

        let decoded = STANDARD.decode(encoded.trim())?;
        let text = String::from_utf8(decoded).map_err(|err| {
            crate::etl_error!(
                ErrorKind::CredentialDecodeFailed,
                "Secret value is not valid UTF-8",
                err,
                source: err
            )
        })?;

        Ok(SecretString::from(text))
    }

    /// Fetches and parses a service-account key stored as a secret.
    pub async fn resolve_service_account(
        &self,
        scope: &str,
        key: &str,
    ) -> EtlResult<ServiceAccountCredentials> {
        let secret = self.get_secret(scope, key).await?;
        let credentials = ServiceAccountCredentials::from_json(secret)?;

        info!(
            project_id = credentials.project_id().unwrap_or("<unknown>"),
            client_email = credentials.client_email().unwrap_or("<unknown>"),
            "resolved service account credentials"
        );

        Ok(credentials)
    }
}

impl fmt::Debug for SecretStoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStoreClient")
            .field("host", &self.host)
            .finish()
    }
}

/// A parsed service-account key.
///
/// The raw JSON is kept as a secret and handed to the warehouse client. Only the
/// non-sensitive identity fields are exposed in clear.
#[derive(Clone)]
pub struct ServiceAccountCredentials {
    key_json: SecretString,
    project_id: Option<String>,
    client_email: Option<String>,
}

impl ServiceAccountCredentials {
    /// Validates that `json` is a JSON object and extracts its identity fields.
    pub fn from_json(json: SecretString) -> EtlResult<Self> {
        let value: serde_json::Value = match serde_json::from_str(json.expose_secret()) {
            Ok(value) => value,
            Err(err) => bail!(
                ErrorKind::CredentialDecodeFailed,
                "Service account key is not valid JSON",
                // The serde message can quote parts of the key.
                format!("error at line {} column {}", err.line(), err.column())
            ),
        };

        let Some(object) = value.as_object() else {
            bail!(
                ErrorKind::CredentialDecodeFailed,
                "Service account key is not a JSON object"
            );
        };

        let field = |name: &str| {
            object
                .get(name)
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        };

        let project_id = field("project_id");
        let client_email = field("client_email");

        Ok(Self {
            key_json: json,
            project_id,
            client_email,
        })
    }

    /// Returns the raw service-account key JSON.
    pub fn key_json(&self) -> &SecretString {
        &self.key_json
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn client_email(&self) -> Option<&str> {
        self.client_email.as_deref()
    }
}

impl fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}
