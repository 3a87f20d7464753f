//! Salted-hash pseudonymization of direct identifiers.
//!
//! Identifiers such as postal codes never reach the destination table in clear text. They
//! are replaced with `lowercase_hex(sha256(value || salt))`, which is bit-identical to the
//! warehouse expression `TO_HEX(SHA256(CONCAT(value, salt)))`. Hashing happens inside the
//! process so the salt is never embedded in SQL text.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::EtlResult;
use crate::types::{Cell, ColumnSchema, ColumnType, RowBatch};

/// Hashes `value` concatenated with `salt` and returns the lowercase hex digest.
pub fn pseudonymize(value: &str, salt: &SecretString) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.update(salt.expose_secret().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Writes the pseudonymized value of `source` into the `target` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudonymizeRule {
    pub source: String,
    pub target: String,
}

impl PseudonymizeRule {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Applies [`PseudonymizeRule`]s to a batch with a fixed salt.
#[derive(Debug, Clone)]
pub struct Pseudonymizer {
    salt: SecretString,
}

impl Pseudonymizer {
    pub fn new(salt: SecretString) -> Self {
        Self { salt }
    }

    pub fn hash(&self, value: &str) -> String {
        pseudonymize(value, &self.salt)
    }

    /// Applies every rule to `batch` in order.
    ///
    /// Nulls stay null. Non-string cells are hashed over their text rendering, the way the
    /// warehouse would coerce them before concatenation.
    pub fn apply(&self, batch: &mut RowBatch, rules: &[PseudonymizeRule]) -> EtlResult<()> {
        for rule in rules {
            let hashed = batch
                .column_values(&rule.source)?
                .map(|cell| match cell.to_text() {
                    Some(text) => Cell::String(self.hash(&text)),
                    None => Cell::Null,
                })
                .collect::<Vec<_>>();

            batch.upsert_column(ColumnSchema::new(&rule.target, ColumnType::String), hashed)?;

            debug!(
                source = %rule.source,
                target = %rule.target,
                rows = batch.len(),
                "pseudonymized column"
            );
        }

        Ok(())
    }
}
