use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt;

/// Logical type of a warehouse column.
///
/// The variants mirror the scalar types the warehouse can return from a query and accept
/// on load. Anything the extraction layer does not recognize is surfaced as
/// [`ColumnType::String`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bool,
    Int64,
    Float64,
    Numeric,
    String,
    Bytes,
    Date,
    Time,
    DateTime,
    Timestamp,
}

impl ColumnType {
    /// Returns the GoogleSQL name of this type.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Bool => "BOOL",
            ColumnType::Int64 => "INT64",
            ColumnType::Float64 => "FLOAT64",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::String => "STRING",
            ColumnType::Bytes => "BYTES",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// A single value in a [`crate::types::TableRow`].
///
/// `Numeric` keeps the warehouse's decimal text untouched since no transform does
/// arithmetic on it.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Numeric(String),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
}

impl Cell {
    /// Returns `true` if the cell is [`Cell::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the column type this cell naturally belongs to, or `None` for nulls.
    pub fn column_type(&self) -> Option<ColumnType> {
        let typ = match self {
            Cell::Null => return None,
            Cell::Bool(_) => ColumnType::Bool,
            Cell::I64(_) => ColumnType::Int64,
            Cell::F64(_) => ColumnType::Float64,
            Cell::Numeric(_) => ColumnType::Numeric,
            Cell::String(_) => ColumnType::String,
            Cell::Bytes(_) => ColumnType::Bytes,
            Cell::Date(_) => ColumnType::Date,
            Cell::Time(_) => ColumnType::Time,
            Cell::DateTime(_) => ColumnType::DateTime,
            Cell::Timestamp(_) => ColumnType::Timestamp,
        };

        Some(typ)
    }

    /// Returns the string slice for [`Cell::String`] cells.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(value) => Some(value),
            _ => None,
        }
    }

    /// Renders the cell the way the warehouse casts it to `STRING`.
    ///
    /// Returns `None` for nulls. Bytes are rendered as lossy UTF-8.
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            Cell::Null => return None,
            Cell::Bool(value) => value.to_string(),
            Cell::I64(value) => value.to_string(),
            Cell::F64(value) => value.to_string(),
            Cell::Numeric(value) | Cell::String(value) => value.clone(),
            Cell::Bytes(value) => String::from_utf8_lossy(value).into_owned(),
            Cell::Date(value) => value.format("%Y-%m-%d").to_string(),
            Cell::Time(value) => value.format("%H:%M:%S%.f").to_string(),
            Cell::DateTime(value) => value.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Cell::Timestamp(value) => value.format("%Y-%m-%d %H:%M:%S%.f+00").to_string(),
        };

        Some(text)
    }
}
