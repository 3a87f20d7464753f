//! Rendering of the SQL statements a run submits to the warehouse.
//!
//! Source queries are stored as templates with a single `{date}` placeholder. The date is
//! process-generated, but it is still rendered as a properly escaped string literal so the
//! templates never splice raw text into SQL.

use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::partition::PartitionDate;

/// Placeholder replaced by the partition date literal.
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Quotes `value` as a GoogleSQL single-quoted string literal.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('\'');

    quoted
}

/// Escapes an identifier for backtick quoting.
///
/// Rejects empty identifiers and identifiers containing control characters.
pub fn sanitize_identifier(identifier: &str, context: &str) -> EtlResult<String> {
    if identifier.is_empty() {
        bail!(
            ErrorKind::DestinationTableNameInvalid,
            "Invalid warehouse identifier",
            format!("{context} cannot be empty")
        );
    }

    if identifier.chars().any(char::is_control) {
        bail!(
            ErrorKind::DestinationTableNameInvalid,
            "Invalid warehouse identifier",
            format!("{context} contains control characters")
        );
    }

    let mut escaped = String::with_capacity(identifier.len());
    for ch in identifier.chars() {
        match ch {
            '`' => escaped.push_str("\\`"),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }

    Ok(escaped)
}

/// Backtick-quotes a single column identifier.
pub fn quote_column(column: &str) -> EtlResult<String> {
    Ok(format!("`{}`", sanitize_identifier(column, "column name")?))
}

/// Fully qualified `project.dataset.table` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(
        project: impl Into<String>,
        dataset: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    /// Renders the reference as a backtick-quoted identifier usable in SQL text.
    pub fn quoted(&self) -> EtlResult<String> {
        let project = sanitize_identifier(&self.project, "project id")?;
        let dataset = sanitize_identifier(&self.dataset, "dataset id")?;
        let table = sanitize_identifier(&self.table, "table id")?;

        Ok(format!("`{project}.{dataset}.{table}`"))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Source query with one `{date}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    sql: String,
}

impl QueryTemplate {
    /// Creates a template, requiring exactly one `{date}` placeholder.
    pub fn new(sql: impl Into<String>) -> EtlResult<Self> {
        let sql = sql.into();

        let occurrences = sql.matches(DATE_PLACEHOLDER).count();
        if occurrences != 1 {
            bail!(
                ErrorKind::ConfigError,
                "Query template must contain exactly one date placeholder",
                format!("found {occurrences} occurrences of {DATE_PLACEHOLDER}")
            );
        }

        Ok(Self { sql })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Renders the template for one partition.
    pub fn render(&self, date: PartitionDate) -> String {
        self.sql
            .replace(DATE_PLACEHOLDER, &quote_literal(&date.to_string()))
    }
}

/// Renders the statement deleting every row of `table` whose `column` equals `date`.
pub fn delete_partition_statement(
    table: &TableRef,
    column: &str,
    date: PartitionDate,
) -> EtlResult<String> {
    Ok(format!(
        "delete from {} where {} = {}",
        table.quoted()?,
        quote_column(column)?,
        quote_literal(&date.to_string())
    ))
}
