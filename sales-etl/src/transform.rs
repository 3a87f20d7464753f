//! Declarative column transforms applied to an extracted [`RowBatch`].
//!
//! A [`TransformSpec`] is an ordered list of [`TransformRule`]s. Rules run one after the
//! other over the whole batch; each one reads the batch as left by the previous rule, so a
//! rule may consume a column that an earlier rule produced. Any rule referencing a column
//! that does not exist aborts the transform with a missing column error.

use chrono::NaiveDate;
use tracing::warn;

use crate::error::EtlResult;
use crate::partition::RunContext;
use crate::types::{Cell, ColumnSchema, ColumnType, RowBatch};

/// One step of a [`TransformSpec`].
///
/// When `source` and `target` are equal the column is rewritten in place. Otherwise the
/// target column is replaced if it exists and appended if it does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformRule {
    /// Duplicates `source` into `target`, keeping its type.
    Copy { source: String, target: String },
    /// Parses `source` into a `DATE` column using the strftime-style `format`.
    ///
    /// Date-like cells are truncated to their date. Text that does not match `format`
    /// becomes null.
    ParseDate {
        source: String,
        target: String,
        format: String,
    },
    /// Parses `source` with `input_format` and renders it back as text with
    /// `output_format`. Text that does not match becomes null.
    ReformatDate {
        source: String,
        target: String,
        input_format: String,
        output_format: String,
    },
    /// Keeps the hour component of a time-of-day value as text, e.g. `"14:32:10"` becomes
    /// `"14"`.
    HourOfDay { source: String, target: String },
    /// Stamps every row with the run's start time.
    RunTimestamp { target: String },
    /// Removes columns. Every named column must exist.
    Drop { columns: Vec<String> },
}

impl TransformRule {
    pub fn copy(source: &str, target: &str) -> Self {
        TransformRule::Copy {
            source: source.to_owned(),
            target: target.to_owned(),
        }
    }

    pub fn parse_date(source: &str, target: &str, format: &str) -> Self {
        TransformRule::ParseDate {
            source: source.to_owned(),
            target: target.to_owned(),
            format: format.to_owned(),
        }
    }

    pub fn reformat_date(
        source: &str,
        target: &str,
        input_format: &str,
        output_format: &str,
    ) -> Self {
        TransformRule::ReformatDate {
            source: source.to_owned(),
            target: target.to_owned(),
            input_format: input_format.to_owned(),
            output_format: output_format.to_owned(),
        }
    }

    pub fn hour_of_day(source: &str, target: &str) -> Self {
        TransformRule::HourOfDay {
            source: source.to_owned(),
            target: target.to_owned(),
        }
    }

    pub fn run_timestamp(target: &str) -> Self {
        TransformRule::RunTimestamp {
            target: target.to_owned(),
        }
    }

    pub fn drop_columns(columns: &[&str]) -> Self {
        TransformRule::Drop {
            columns: columns.iter().map(|column| (*column).to_owned()).collect(),
        }
    }

    fn apply(&self, batch: &mut RowBatch, ctx: &RunContext) -> EtlResult<()> {
        match self {
            TransformRule::Copy { source, target } => {
                let typ = batch.column(source)?.typ;
                let values = batch.column_values(source)?.cloned().collect();

                batch.upsert_column(ColumnSchema::new(target, typ), values)
            }
            TransformRule::ParseDate {
                source,
                target,
                format,
            } => {
                let mut unparsed = 0usize;
                let values = batch
                    .column_values(source)?
                    .map(|cell| match cell_to_date(cell, format) {
                        Some(date) => Cell::Date(date),
                        None => {
                            if !cell.is_null() {
                                unparsed += 1;
                            }
                            Cell::Null
                        }
                    })
                    .collect();

                if unparsed > 0 {
                    warn!(
                        column = %source,
                        %format,
                        unparsed,
                        "values did not match the date format and were set to null"
                    );
                }

                batch.upsert_column(ColumnSchema::new(target, ColumnType::Date), values)
            }
            TransformRule::ReformatDate {
                source,
                target,
                input_format,
                output_format,
            } => {
                let mut unparsed = 0usize;
                let values = batch
                    .column_values(source)?
                    .map(|cell| match cell_to_date(cell, input_format) {
                        Some(date) => Cell::String(date.format(output_format).to_string()),
                        None => {
                            if !cell.is_null() {
                                unparsed += 1;
                            }
                            Cell::Null
                        }
                    })
                    .collect();

                if unparsed > 0 {
                    warn!(
                        column = %source,
                        format = %input_format,
                        unparsed,
                        "values did not match the date format and were set to null"
                    );
                }

                batch.upsert_column(ColumnSchema::new(target, ColumnType::String), values)
            }
            TransformRule::HourOfDay { source, target } => {
                let values = batch.column_values(source)?.map(cell_to_hour).collect();

                batch.upsert_column(ColumnSchema::new(target, ColumnType::String), values)
            }
            TransformRule::RunTimestamp { target } => {
                let values = vec![Cell::DateTime(ctx.started_at()); batch.len()];

                batch.upsert_column(ColumnSchema::new(target, ColumnType::DateTime), values)
            }
            TransformRule::Drop { columns } => batch.drop_columns(columns.as_slice()),
        }
    }
}

/// Converts a cell to a calendar date, returning `None` for nulls and unparseable text.
fn cell_to_date(cell: &Cell, format: &str) -> Option<NaiveDate> {
    match cell {
        Cell::Null => None,
        Cell::Date(date) => Some(*date),
        Cell::DateTime(datetime) => Some(datetime.date()),
        Cell::Timestamp(timestamp) => Some(timestamp.date_naive()),
        other => other
            .to_text()
            .and_then(|text| NaiveDate::parse_from_str(text.trim(), format).ok()),
    }
}

fn cell_to_hour(cell: &Cell) -> Cell {
    match cell {
        Cell::Null => Cell::Null,
        Cell::Time(time) => Cell::String(time.format("%H").to_string()),
        Cell::DateTime(datetime) => Cell::String(datetime.format("%H").to_string()),
        Cell::Timestamp(timestamp) => Cell::String(timestamp.format("%H").to_string()),
        other => match other.to_text() {
            Some(text) => {
                let hour = text.split(':').next().unwrap_or_default();
                Cell::String(hour.to_owned())
            }
            None => Cell::Null,
        },
    }
}

/// Ordered list of rules turning an extracted batch into the destination batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransformSpec {
    rules: Vec<TransformRule>,
}

impl TransformSpec {
    pub fn new(rules: Vec<TransformRule>) -> Self {
        Self { rules }
    }

    /// Runs every rule over `batch` and returns the transformed batch.
    ///
    /// On error the partially transformed batch is discarded.
    pub fn apply(&self, mut batch: RowBatch, ctx: &RunContext) -> EtlResult<RowBatch> {
        for rule in &self.rules {
            rule.apply(&mut batch, ctx)?;
        }

        Ok(batch)
    }
}
