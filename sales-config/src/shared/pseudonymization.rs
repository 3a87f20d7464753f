use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::shared::ValidationError;
use crate::shared::secrets::empty_secret;

/// Salt appended to identifiers before hashing.
///
/// The salt is the only thing preventing dictionary attacks on hashed postal codes, so it
/// is supplied through `APP_PSEUDONYMIZATION__SALT` in production and never logged.
#[derive(Debug, Clone, Deserialize)]
pub struct PseudonymizationConfig {
    #[serde(default = "empty_secret")]
    pub salt: SecretString,
}

impl PseudonymizationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.salt.expose_secret().is_empty() {
            return Err(ValidationError::missing_with_hint(
                "pseudonymization.salt",
                " (set APP_PSEUDONYMIZATION__SALT)",
            ));
        }

        Ok(())
    }
}
