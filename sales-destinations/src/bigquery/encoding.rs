use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use gcp_bigquery_client::model::field_type::FieldType;
use gcp_bigquery_client::storage::{
    ColumnMode, ColumnType as StorageColumnType, FieldDescriptor, TableDescriptor,
};
use prost::bytes;
use sales_etl::error::{ErrorKind, EtlResult};
use sales_etl::etl_error;
use sales_etl::types::{Cell, ColumnSchema, ColumnType, TableRow};
use serde_json::Value;

/// Layout of `DATETIME` values in query results.
const DATETIME_RESULT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A row encoded for the Storage Write API.
///
/// Cells are written with tags `1..=n` in column order, matching the descriptor built by
/// [`table_descriptor`]. Null cells are omitted from the wire form.
#[derive(Debug, Clone)]
pub struct BigQueryTableRow(pub TableRow);

impl From<TableRow> for BigQueryTableRow {
    fn from(row: TableRow) -> Self {
        Self(row)
    }
}

impl prost::Message for BigQueryTableRow {
    fn encode_raw(&self, buf: &mut impl bytes::BufMut)
    where
        Self: Sized,
    {
        let mut tag = 1;
        for cell in self.0.values() {
            cell_encode_prost(cell, tag, buf);
            tag += 1;
        }
    }

    fn merge_field(
        &mut self,
        _tag: u32,
        _wire_type: prost::encoding::WireType,
        _buf: &mut impl bytes::Buf,
        _ctx: prost::encoding::DecodeContext,
    ) -> Result<(), prost::DecodeError>
    where
        Self: Sized,
    {
        unimplemented!("rows are only ever encoded");
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        let mut tag = 1;
        for cell in self.0.values() {
            len += cell_encode_len_prost(cell, tag);
            tag += 1;
        }

        len
    }

    fn clear(&mut self) {
        for cell in self.0.values_mut() {
            *cell = Cell::Null;
        }
    }
}

/// Returns the text form the Storage Write API expects for cells sent as strings.
fn cell_wire_text(cell: &Cell) -> Option<String> {
    let text = match cell {
        Cell::Numeric(value) | Cell::String(value) => value.clone(),
        Cell::Date(value) => value.format("%Y-%m-%d").to_string(),
        Cell::Time(value) => value.format("%H:%M:%S%.f").to_string(),
        Cell::DateTime(value) => value.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        Cell::Timestamp(value) => value.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string(),
        Cell::Null | Cell::Bool(_) | Cell::I64(_) | Cell::F64(_) | Cell::Bytes(_) => {
            return None;
        }
    };

    Some(text)
}

pub fn cell_encode_prost(cell: &Cell, tag: u32, buf: &mut impl bytes::BufMut) {
    match cell {
        Cell::Null => {}
        Cell::Bool(b) => prost::encoding::bool::encode(tag, b, buf),
        Cell::I64(i) => prost::encoding::int64::encode(tag, i, buf),
        Cell::F64(f) => prost::encoding::double::encode(tag, f, buf),
        Cell::Bytes(b) => prost::encoding::bytes::encode(tag, b, buf),
        _ => {
            if let Some(text) = cell_wire_text(cell) {
                prost::encoding::string::encode(tag, &text, buf);
            }
        }
    }
}

pub fn cell_encode_len_prost(cell: &Cell, tag: u32) -> usize {
    match cell {
        Cell::Null => 0,
        Cell::Bool(b) => prost::encoding::bool::encoded_len(tag, b),
        Cell::I64(i) => prost::encoding::int64::encoded_len(tag, i),
        Cell::F64(f) => prost::encoding::double::encoded_len(tag, f),
        Cell::Bytes(b) => prost::encoding::bytes::encoded_len(tag, b),
        _ => cell_wire_text(cell)
            .map(|text| prost::encoding::string::encoded_len(tag, &text))
            .unwrap_or(0),
    }
}

/// Maps a column type to the protobuf type used on the write stream.
///
/// Temporal and decimal columns travel as strings and are coerced by the service.
fn storage_column_type(typ: ColumnType) -> StorageColumnType {
    match typ {
        ColumnType::Bool => StorageColumnType::Bool,
        ColumnType::Int64 => StorageColumnType::Int64,
        ColumnType::Float64 => StorageColumnType::Double,
        ColumnType::Bytes => StorageColumnType::Bytes,
        ColumnType::Numeric
        | ColumnType::String
        | ColumnType::Date
        | ColumnType::Time
        | ColumnType::DateTime
        | ColumnType::Timestamp => StorageColumnType::String,
    }
}

/// Builds the write stream descriptor for rows laid out as `columns`.
///
/// Every column is nullable.
pub fn table_descriptor(columns: &[ColumnSchema]) -> TableDescriptor {
    let field_descriptors = columns
        .iter()
        .zip(1..)
        .map(|(column, number)| FieldDescriptor {
            number,
            name: column.name.clone(),
            typ: storage_column_type(column.typ),
            mode: ColumnMode::Nullable,
        })
        .collect();

    TableDescriptor { field_descriptors }
}

/// Maps a query result field type to a column type.
///
/// Types without a scalar counterpart (records, geography, json, intervals) are read as
/// their text form.
pub fn field_type_to_column_type(field_type: &FieldType) -> ColumnType {
    match field_type {
        FieldType::Bool | FieldType::Boolean => ColumnType::Bool,
        FieldType::Int64 | FieldType::Integer => ColumnType::Int64,
        FieldType::Float64 | FieldType::Float => ColumnType::Float64,
        FieldType::Numeric => ColumnType::Numeric,
        FieldType::String => ColumnType::String,
        FieldType::Bytes => ColumnType::Bytes,
        FieldType::Date => ColumnType::Date,
        FieldType::Time => ColumnType::Time,
        FieldType::Datetime => ColumnType::DateTime,
        FieldType::Timestamp => ColumnType::Timestamp,
        _ => ColumnType::String,
    }
}

/// Decodes one query result value into a [`Cell`] of type `typ`.
///
/// Query results carry every scalar as a JSON string. Timestamps arrive as floating point
/// seconds since the epoch and are rounded to microseconds.
pub fn json_to_cell(value: Option<&Value>, typ: ColumnType) -> EtlResult<Cell> {
    let text = match value {
        None | Some(Value::Null) => return Ok(Cell::Null),
        Some(Value::String(text)) => text.clone(),
        Some(other) if typ == ColumnType::String => return Ok(Cell::String(other.to_string())),
        Some(Value::Bool(value)) => value.to_string(),
        Some(Value::Number(value)) => value.to_string(),
        Some(other) => {
            return Err(etl_error!(
                ErrorKind::ConversionError,
                "Unsupported query result value",
                format!("cannot read {other} as {typ}")
            ));
        }
    };

    let conversion_error = |reason: String| {
        etl_error!(
            ErrorKind::ConversionError,
            "Query result value does not match its column type",
            format!("cannot read '{text}' as {typ}: {reason}")
        )
    };

    let cell = match typ {
        ColumnType::Bool => Cell::Bool(
            text.parse::<bool>()
                .map_err(|err| conversion_error(err.to_string()))?,
        ),
        ColumnType::Int64 => Cell::I64(
            text.parse::<i64>()
                .map_err(|err| conversion_error(err.to_string()))?,
        ),
        ColumnType::Float64 => Cell::F64(
            text.parse::<f64>()
                .map_err(|err| conversion_error(err.to_string()))?,
        ),
        ColumnType::Numeric => Cell::Numeric(text),
        ColumnType::String => Cell::String(text),
        ColumnType::Bytes => Cell::Bytes(
            STANDARD
                .decode(&text)
                .map_err(|err| conversion_error(err.to_string()))?,
        ),
        ColumnType::Date => Cell::Date(
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map_err(|err| conversion_error(err.to_string()))?,
        ),
        ColumnType::Time => Cell::Time(
            NaiveTime::parse_from_str(&text, "%H:%M:%S%.f")
                .map_err(|err| conversion_error(err.to_string()))?,
        ),
        ColumnType::DateTime => Cell::DateTime(
            NaiveDateTime::parse_from_str(&text, DATETIME_RESULT_FORMAT)
                .map_err(|err| conversion_error(err.to_string()))?,
        ),
        ColumnType::Timestamp => {
            let seconds = text
                .parse::<f64>()
                .map_err(|err| conversion_error(err.to_string()))?;
            let micros = (seconds * 1_000_000.0).round() as i64;
            let timestamp = DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| conversion_error("timestamp out of range".to_owned()))?;

            Cell::Timestamp(timestamp)
        }
    };

    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use prost::Message;
    use serde_json::json;

    fn decode(value: Value, typ: ColumnType) -> EtlResult<Cell> {
        json_to_cell(Some(&value), typ)
    }

    #[test]
    fn test_json_to_cell_scalars() {
        assert_eq!(decode(json!("true"), ColumnType::Bool).unwrap(), Cell::Bool(true));
        assert_eq!(decode(json!("42"), ColumnType::Int64).unwrap(), Cell::I64(42));
        assert_eq!(decode(json!("1.5"), ColumnType::Float64).unwrap(), Cell::F64(1.5));
        assert_eq!(
            decode(json!("123.4500"), ColumnType::Numeric).unwrap(),
            Cell::Numeric("123.4500".to_owned())
        );
        assert_eq!(
            decode(json!("aGk="), ColumnType::Bytes).unwrap(),
            Cell::Bytes(b"hi".to_vec())
        );
        assert_eq!(json_to_cell(None, ColumnType::String).unwrap(), Cell::Null);
        assert_eq!(
            json_to_cell(Some(&Value::Null), ColumnType::Date).unwrap(),
            Cell::Null
        );
    }

    #[test]
    fn test_json_to_cell_temporal() {
        assert_eq!(
            decode(json!("2024-03-05"), ColumnType::Date).unwrap(),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
        );
        assert_eq!(
            decode(json!("14:32:10"), ColumnType::Time).unwrap(),
            Cell::Time(NaiveTime::from_hms_opt(14, 32, 10).unwrap())
        );
        assert_eq!(
            decode(json!("2024-03-05T14:32:10.250"), ColumnType::DateTime).unwrap(),
            Cell::DateTime(
                NaiveDate::from_ymd_opt(2024, 3, 5)
                    .unwrap()
                    .and_hms_milli_opt(14, 32, 10, 250)
                    .unwrap()
            )
        );
        assert_eq!(
            decode(json!("1.70964793E9"), ColumnType::Timestamp).unwrap(),
            Cell::Timestamp(Utc.with_ymd_and_hms(2024, 3, 5, 14, 12, 10).unwrap())
        );
    }

    #[test]
    fn test_json_to_cell_rejects_mismatched_text() {
        let err = decode(json!("05-03-2024"), ColumnType::Date).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConversionError);
        assert!(err.detail().unwrap().contains("05-03-2024"));
    }

    #[test]
    fn test_table_descriptor_numbers_fields_in_order() {
        let descriptor = table_descriptor(&[
            ColumnSchema::new("pedido", ColumnType::String),
            ColumnSchema::new("quantidade", ColumnType::Int64),
            ColumnSchema::new("data_pedido", ColumnType::Date),
        ]);

        let fields: Vec<_> = descriptor
            .field_descriptors
            .iter()
            .map(|field| (field.number, field.name.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![(1, "pedido"), (2, "quantidade"), (3, "data_pedido")]
        );
    }

    #[test]
    fn test_row_encoding_skips_nulls() {
        let with_null = BigQueryTableRow(TableRow::new(vec![
            Cell::String("P-1".to_owned()),
            Cell::Null,
            Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
        ]));
        let without_null = BigQueryTableRow(TableRow::new(vec![
            Cell::String("P-1".to_owned()),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()),
        ]));

        let encoded = with_null.encode_to_vec();

        assert_eq!(encoded.len(), with_null.encoded_len());
        // Tag 1 string "P-1" followed by tag 3 string "2024-03-05".
        assert_eq!(&encoded[..5], &[0x0a, 3, b'P', b'-', b'1']);
        assert_eq!(encoded[5], 0x1a);
        assert_eq!(&encoded[7..], b"2024-03-05");
        assert_ne!(encoded, without_null.encode_to_vec());
    }
}
