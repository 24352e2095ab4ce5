use std::{borrow::Cow, num::ParseIntError, sync::Arc};

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use csv::ByteRecord;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Number of tab separated columns in a name row.
pub const FIELD_COUNT: usize = 10;

/// Column names in file order. The first one is the integer id, the rest are text.
pub const COLUMN_NAMES: [&str; FIELD_COUNT] = [
    "record_id",
    "assessors_parcel_number",
    "parcel_sequence_number",
    "name_sequence_number",
    "name",
    "name_et_stnd_code",
    "name_description_stnd_code",
    "name_type_stnd_code",
    "name_pattern_stnd_code",
    "name_class_stnd_code",
];

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("record_id {value:?} is not an integer")]
    InvalidRecordId {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// What to do with a `record_id` that does not parse as an integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdPolicy {
    #[default]
    Strict,
    /// Store 0 instead. Older outputs were produced this way.
    Lenient,
}

/// One row of the assessor name file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NameRecord {
    pub record_id: i64,
    pub assessors_parcel_number: String,
    pub parcel_sequence_number: String,
    pub name_sequence_number: String,
    pub name: String,
    pub name_et_stnd_code: String,
    pub name_description_stnd_code: String,
    pub name_type_stnd_code: String,
    pub name_pattern_stnd_code: String,
    pub name_class_stnd_code: String,
}

impl NameRecord {
    /// Builds a record from one row. Text is taken as is, bytes that are not
    /// UTF-8 are replaced with U+FFFD and reported with a warning.
    pub fn from_row(row: &ByteRecord, ids: IdPolicy) -> Result<Self, RecordError> {
        if row.len() != FIELD_COUNT {
            return Err(RecordError::FieldCount {
                expected: FIELD_COUNT,
                found: row.len(),
            });
        }

        let text = |i: usize| -> String {
            match String::from_utf8_lossy(&row[i]) {
                Cow::Borrowed(value) => value.to_string(),
                Cow::Owned(value) => {
                    warn!(
                        line = row.position().map(|p| p.line()),
                        column = COLUMN_NAMES[i],
                        "replaced invalid utf-8"
                    );
                    value
                }
            }
        };

        let raw_id = text(0);
        let record_id = match (raw_id.parse::<i64>(), ids) {
            (Ok(id), _) => id,
            (Err(_), IdPolicy::Lenient) => 0,
            (Err(source), IdPolicy::Strict) => {
                return Err(RecordError::InvalidRecordId {
                    value: raw_id,
                    source,
                })
            }
        };

        Ok(Self {
            record_id,
            assessors_parcel_number: text(1),
            parcel_sequence_number: text(2),
            name_sequence_number: text(3),
            name: text(4),
            name_et_stnd_code: text(5),
            name_description_stnd_code: text(6),
            name_type_stnd_code: text(7),
            name_pattern_stnd_code: text(8),
            name_class_stnd_code: text(9),
        })
    }

    /// The nine text columns, in file order.
    pub fn text_fields(&self) -> [&str; FIELD_COUNT - 1] {
        [
            &self.assessors_parcel_number,
            &self.parcel_sequence_number,
            &self.name_sequence_number,
            &self.name,
            &self.name_et_stnd_code,
            &self.name_description_stnd_code,
            &self.name_type_stnd_code,
            &self.name_pattern_stnd_code,
            &self.name_class_stnd_code,
        ]
    }
}

impl TryFrom<&ByteRecord> for NameRecord {
    type Error = RecordError;

    fn try_from(row: &ByteRecord) -> Result<Self, Self::Error> {
        Self::from_row(row, IdPolicy::Strict)
    }
}

/// Arrow schema of the parquet output. Every column is required.
pub fn schema() -> SchemaRef {
    let fields: Vec<Field> = COLUMN_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let data_type = if i == 0 {
                DataType::Int64
            } else {
                DataType::Utf8
            };
            Field::new(*name, data_type, false)
        })
        .collect();
    Arc::new(Schema::new(fields))
}
