use std::collections::HashSet;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::cell::{Cell, ColumnType};

/// Name and logical type of one column in a [`RowBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub typ: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: ColumnType) -> Self {
        Self {
            name: name.into(),
            typ,
        }
    }
}

/// A single row of a [`RowBatch`].
///
/// Values are ordered to match the owning batch's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Returns the row values in column order.
    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Returns mutable access to the row values in column order.
    pub fn values_mut(&mut self) -> &mut Vec<Cell> {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<Cell> {
        self.values
    }
}

/// The full result set of one extraction, held in memory for the rest of the run.
///
/// Every row has exactly one value per column. Column types are tracked independently of
/// the rows so that an empty batch still describes the table it came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowBatch {
    columns: Vec<ColumnSchema>,
    rows: Vec<TableRow>,
}

impl RowBatch {
    /// Creates a batch, checking that every row matches the column count.
    pub fn new(columns: Vec<ColumnSchema>, rows: Vec<TableRow>) -> EtlResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                bail!(
                    ErrorKind::InvalidData,
                    "Duplicate column in row batch",
                    column.name
                );
            }
        }

        for (index, row) in rows.iter().enumerate() {
            if row.values.len() != columns.len() {
                bail!(
                    ErrorKind::InvalidData,
                    "Row width does not match the batch columns",
                    format!(
                        "row {index} has {} values, expected {}",
                        row.values.len(),
                        columns.len()
                    )
                );
            }
        }

        Ok(Self { columns, rows })
    }

    /// Creates a batch with the given columns and no rows.
    pub fn empty(columns: Vec<ColumnSchema>) -> EtlResult<Self> {
        Self::new(columns, Vec::new())
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    /// Returns the position of `name`, if present.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Returns the position of `name`, failing with [`ErrorKind::MissingColumn`] when absent.
    pub fn column_index(&self, name: &str) -> EtlResult<usize> {
        match self.find_column(name) {
            Some(index) => Ok(index),
            None => bail!(
                ErrorKind::MissingColumn,
                "Column not found in row batch",
                name
            ),
        }
    }

    /// Returns the schema of column `name`.
    pub fn column(&self, name: &str) -> EtlResult<&ColumnSchema> {
        let index = self.column_index(name)?;
        Ok(&self.columns[index])
    }

    /// Returns the values of column `name` in row order.
    pub fn column_values(&self, name: &str) -> EtlResult<impl Iterator<Item = &Cell>> {
        let index = self.column_index(name)?;
        Ok(self.rows.iter().map(move |row| &row.values[index]))
    }

    /// Sets a column to the given values.
    ///
    /// An existing column with the same name is replaced in place, keeping its position;
    /// otherwise the column is appended.
    pub fn upsert_column(&mut self, schema: ColumnSchema, values: Vec<Cell>) -> EtlResult<()> {
        if values.len() != self.rows.len() {
            bail!(
                ErrorKind::InvalidState,
                "Column values do not match the batch row count",
                format!(
                    "column '{}' has {} values, batch has {} rows",
                    schema.name,
                    values.len(),
                    self.rows.len()
                )
            );
        }

        match self.find_column(&schema.name) {
            Some(index) => {
                self.columns[index] = schema;
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.values[index] = value;
                }
            }
            None => {
                self.columns.push(schema);
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.values.push(value);
                }
            }
        }

        Ok(())
    }

    /// Removes the given columns.
    ///
    /// All names are resolved before anything is removed, so a missing column leaves the
    /// batch untouched.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> EtlResult<()> {
        let mut indexes = Vec::with_capacity(names.len());
        for name in names {
            indexes.push(self.column_index(name.as_ref())?);
        }

        indexes.sort_unstable();
        indexes.dedup();

        for index in indexes.into_iter().rev() {
            self.columns.remove(index);
            for row in &mut self.rows {
                row.values.remove(index);
            }
        }

        Ok(())
    }

    /// Appends a row, checking its width.
    pub fn push_row(&mut self, row: TableRow) -> EtlResult<()> {
        if row.values.len() != self.columns.len() {
            bail!(
                ErrorKind::InvalidData,
                "Row width does not match the batch columns",
                format!(
                    "row has {} values, expected {}",
                    row.values.len(),
                    self.columns.len()
                )
            );
        }

        self.rows.push(row);
        Ok(())
    }

    /// Keeps only the rows for which `keep` returns `true`.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&TableRow) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    pub fn into_parts(self) -> (Vec<ColumnSchema>, Vec<TableRow>) {
        (self.columns, self.rows)
    }
}
