use crate::record::{schema, NameRecord, COLUMN_NAMES};
use anyhow::{Context, Result};
use arrow::{
    array::{
        ArrayBuilder, ArrayRef, AsArray, Int64Builder, RecordBatch, StringBuilder, StructArray,
    },
    datatypes::{Int64Type, SchemaRef},
};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
    schema::types::ColumnPath,
};
use std::{fs::File, path::Path, sync::Arc};
use tracing::debug;

/// Destination for converted records.
///
/// `close` consumes the sink: it flushes whatever is still buffered and
/// finalizes the output, after which nothing more can be written.
pub trait RecordSink {
    fn write(&mut self, record: &NameRecord) -> Result<()>;

    fn close(self) -> Result<SinkSummary>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkSummary {
    pub rows: u64,
    pub row_groups: usize,
}

/// In memory sink, records are kept in write order.
impl RecordSink for &mut Vec<NameRecord> {
    fn write(&mut self, record: &NameRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }

    fn close(self) -> Result<SinkSummary> {
        Ok(SinkSummary {
            rows: self.len() as u64,
            row_groups: usize::from(!self.is_empty()),
        })
    }
}

#[derive(Clone, Debug)]
pub struct SinkOptions {
    pub compression: Compression,
    /// A row group is flushed once the writer buffers at least this many bytes.
    pub row_group_bytes: usize,
    /// Rows collected in the arrow builders before they become a batch.
    pub batch_size: usize,
}

// Collects `NameRecord`s column by column
#[derive(Debug, Default)]
struct NameRecordBuilder {
    record_id: Int64Builder,
    text: [StringBuilder; 9],
}

impl NameRecordBuilder {
    fn append(&mut self, record: &NameRecord) {
        self.record_id.append_value(record.record_id);
        for (builder, value) in self.text.iter_mut().zip(record.text_fields()) {
            builder.append_value(value);
        }
    }

    fn len(&self) -> usize {
        self.record_id.len()
    }

    fn finish(&mut self, schema: &SchemaRef) -> StructArray {
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(COLUMN_NAMES.len());
        columns.push(Arc::new(self.record_id.finish()));
        columns.extend(
            self.text
                .iter_mut()
                .map(|builder| Arc::new(builder.finish()) as ArrayRef),
        );

        StructArray::from(
            schema
                .fields()
                .iter()
                .cloned()
                .zip(columns)
                .collect::<Vec<_>>(),
        )
    }
}

/// Writes `NameRecord`s into a single parquet file.
pub struct ParquetSink {
    writer: ArrowWriter<File>,
    builder: NameRecordBuilder,
    schema: SchemaRef,
    options: SinkOptions,
    rows: u64,
}

impl ParquetSink {
    pub fn create(path: &Path, options: SinkOptions) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("create output {}", path.display()))?;

        let schema = schema();
        let properties = WriterProperties::builder()
            .set_compression(options.compression)
            .set_dictionary_enabled(true)
            .set_column_dictionary_enabled(ColumnPath::from(COLUMN_NAMES[0]), false)
            // row groups are cut by `row_group_bytes` only
            .set_max_row_group_size(usize::MAX)
            .build();

        let writer = ArrowWriter::try_new(file, schema.clone(), Some(properties))
            .context("create parquet writer")?;

        Ok(Self {
            writer,
            builder: NameRecordBuilder::default(),
            schema,
            options,
            rows: 0,
        })
    }

    fn write_batch(&mut self) -> Result<()> {
        if self.builder.len() == 0 {
            return Ok(());
        }
        let batch = RecordBatch::from(&self.builder.finish(&self.schema));
        self.writer.write(&batch).context("write record batch")?;

        if self.writer.in_progress_size() >= self.options.row_group_bytes {
            debug!(
                bytes = self.writer.in_progress_size(),
                rows = self.writer.in_progress_rows(),
                "flushing row group"
            );
            self.writer.flush().context("flush row group")?;
        }
        Ok(())
    }
}

impl RecordSink for ParquetSink {
    fn write(&mut self, record: &NameRecord) -> Result<()> {
        self.builder.append(record);
        self.rows += 1;
        if self.builder.len() >= self.options.batch_size.max(1) {
            self.write_batch()?;
        }
        Ok(())
    }

    fn close(mut self) -> Result<SinkSummary> {
        self.write_batch()?;
        let metadata = self.writer.close().context("finalize parquet file")?;
        Ok(SinkSummary {
            rows: self.rows,
            row_groups: metadata.row_groups.len(),
        })
    }
}

/// Reads a parquet file written by [`ParquetSink`] back into records.
pub fn read_parquet(path: &Path) -> Result<Vec<NameRecord>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("open parquet reader")?
        .build()
        .context("build parquet reader")?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.context("read record batch")?;
        let ids = batch.column(0).as_primitive::<Int64Type>();
        let text: Vec<_> = (1..COLUMN_NAMES.len())
            .map(|i| batch.column(i).as_string::<i32>())
            .collect();

        for row in 0..batch.num_rows() {
            let value = |column: usize| text[column].value(row).to_string();
            records.push(NameRecord {
                record_id: ids.value(row),
                assessors_parcel_number: value(0),
                parcel_sequence_number: value(1),
                name_sequence_number: value(2),
                name: value(3),
                name_et_stnd_code: value(4),
                name_description_stnd_code: value(5),
                name_type_stnd_code: value(6),
                name_pattern_stnd_code: value(7),
                name_class_stnd_code: value(8),
            });
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::{
        basic::Encoding,
        file::reader::{FileReader, SerializedFileReader},
    };

    fn options() -> SinkOptions {
        SinkOptions {
            compression: Compression::SNAPPY,
            row_group_bytes: 128 * 1024 * 1024,
            batch_size: 4,
        }
    }

    fn record(id: i64, name: &str) -> NameRecord {
        NameRecord {
            record_id: id,
            assessors_parcel_number: format!("AP{}", id % 3),
            parcel_sequence_number: "PS1".into(),
            name_sequence_number: format!("NS{id}"),
            name: name.into(),
            name_et_stnd_code: "E1".into(),
            name_description_stnd_code: "D1".into(),
            name_type_stnd_code: "T1".into(),
            name_pattern_stnd_code: "P1".into(),
            name_class_stnd_code: "C1".into(),
        }
    }

    #[test]
    fn round_trips_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("name.parquet");
        let records: Vec<NameRecord> = (0..10).map(|i| record(i, &format!("n{i}"))).collect();

        let mut sink = ParquetSink::create(&path, options()).unwrap();
        for r in &records {
            sink.write(r).unwrap();
        }
        let summary = sink.close().unwrap();

        assert_eq!(summary.rows, 10);
        assert_eq!(summary.row_groups, 1);
        assert_eq!(read_parquet(&path).unwrap(), records);
    }

    #[test]
    fn empty_sink_writes_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.parquet");

        let summary = ParquetSink::create(&path, options())
            .unwrap()
            .close()
            .unwrap();

        assert_eq!(summary.rows, 0);
        assert!(read_parquet(&path).unwrap().is_empty());
    }

    #[test]
    fn small_byte_target_splits_row_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.parquet");
        let options = SinkOptions {
            row_group_bytes: 1,
            ..options()
        };

        let mut sink = ParquetSink::create(&path, options).unwrap();
        for i in 0..12 {
            sink.write(&record(i, "Main St")).unwrap();
        }
        let summary = sink.close().unwrap();

        assert_eq!(summary.row_groups, 3);
        assert_eq!(read_parquet(&path).unwrap().len(), 12);
    }

    #[test]
    fn default_byte_target_keeps_one_row_group_past_a_million_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.parquet");
        let options = SinkOptions {
            batch_size: 8192,
            ..options()
        };

        let mut sink = ParquetSink::create(&path, options).unwrap();
        let mut row = record(0, "Main St");
        for i in 0..1_100_000 {
            row.record_id = i;
            sink.write(&row).unwrap();
        }
        let summary = sink.close().unwrap();

        assert_eq!(summary.rows, 1_100_000);
        assert_eq!(summary.row_groups, 1);
        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(reader.metadata().row_group(0).num_rows(), 1_100_000);
    }

    #[test]
    fn text_columns_use_dictionary_and_codec() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encodings.parquet");

        let mut sink = ParquetSink::create(&path, options()).unwrap();
        for i in 0..6 {
            sink.write(&record(i, "Main St")).unwrap();
        }
        sink.close().unwrap();

        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        let row_group = reader.metadata().row_group(0);
        let is_dictionary =
            |e: &Encoding| matches!(e, Encoding::PLAIN_DICTIONARY | Encoding::RLE_DICTIONARY);

        assert!(!row_group.column(0).encodings().iter().any(is_dictionary));
        for i in 1..COLUMN_NAMES.len() {
            let column = row_group.column(i);
            assert!(column.encodings().iter().any(is_dictionary));
            assert_eq!(column.compression(), Compression::SNAPPY);
        }
    }

    #[test]
    fn vec_sink_keeps_order() {
        let mut records = Vec::new();
        let mut sink = &mut records;
        sink.write(&record(2, "b")).unwrap();
        sink.write(&record(1, "a")).unwrap();
        let summary = sink.close().unwrap();
        assert_eq!(records[0].record_id, 2);
        assert_eq!(summary, SinkSummary { rows: 2, row_groups: 1 });
    }
}
