use crate::{
    cli::Cli,
    record::{IdPolicy, NameRecord},
    sink::{read_parquet, ParquetSink, RecordSink, SinkOptions, SinkSummary},
    source::LineSource,
};
use anyhow::{bail, Context, Result};
use std::io::Read;
use tracing::{debug, info};

/// 128 MiB, the row group target of the name files.
pub const DEFAULT_ROW_GROUP_BYTES: usize = 128 * 1024 * 1024;
pub const DEFAULT_BATCH_SIZE: usize = 8192;
const PROGRESS_EVERY: u64 = 100_000;

/// Maximum number of rows to convert. Zero or negative means no limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowLimit(i64);

impl RowLimit {
    pub fn new(rows: i64) -> Self {
        Self(rows)
    }

    fn reached(self, rows: u64) -> bool {
        u64::try_from(self.0).is_ok_and(|limit| limit > 0 && rows >= limit)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertOptions {
    pub limit: RowLimit,
    pub ids: IdPolicy,
}

/// Reads rows from `source`, converts them and hands them to `sink` in order,
/// then closes the sink.
pub fn convert<R, S>(
    mut source: LineSource<R>,
    mut sink: S,
    options: &ConvertOptions,
) -> Result<SinkSummary>
where
    R: Read,
    S: RecordSink,
{
    debug!(header = ?source.header(), "skipped header");

    let mut rows: u64 = 0;
    while !options.limit.reached(rows) {
        let Some(row) = source.next_row()? else {
            break;
        };
        // header is line 1
        let line = row.position().map_or(rows + 2, |p| p.line());
        let record = NameRecord::from_row(&row, options.ids)
            .with_context(|| format!("convert line {line}"))?;

        debug!(
            record = %serde_json::to_string(&record).unwrap_or_default(),
            "writing"
        );
        sink.write(&record)
            .with_context(|| format!("write line {line}"))?;

        rows += 1;
        if rows % PROGRESS_EVERY == 0 {
            info!(rows, "rows written");
        }
    }

    sink.close()
}

pub fn convert_to_parquet(cli: &Cli) -> Result<SinkSummary> {
    info!(src = %cli.src.display(), dst = %cli.dst.display(), "Starting");

    let sink = ParquetSink::create(
        &cli.dst,
        SinkOptions {
            compression: cli.compression.into(),
            row_group_bytes: cli.row_group_bytes,
            batch_size: cli.batch_size,
        },
    )?;
    let source = LineSource::from_path(&cli.src)?;

    info!("Reading tsv file");
    let options = ConvertOptions {
        limit: RowLimit::new(cli.limit),
        ids: if cli.lenient_ids {
            IdPolicy::Lenient
        } else {
            IdPolicy::Strict
        },
    };
    let summary = convert(source, sink, &options)
        .with_context(|| format!("convert {}", cli.src.display()))?;

    if cli.verify {
        verify(cli, &options)?;
        info!(rows = summary.rows, "verified output");
    }
    Ok(summary)
}

/// Converts the input again in memory and checks the parquet file holds the
/// same records in the same order.
fn verify(cli: &Cli, options: &ConvertOptions) -> Result<()> {
    let mut expected = Vec::new();
    convert(LineSource::from_path(&cli.src)?, &mut expected, options)?;
    let written = read_parquet(&cli.dst)?;

    if written.len() != expected.len() {
        bail!(
            "{} holds {} rows, expected {}",
            cli.dst.display(),
            written.len(),
            expected.len()
        );
    }
    if let Some(row) = written.iter().zip(&expected).position(|(w, e)| w != e) {
        bail!("{} differs from the input at row {}", cli.dst.display(), row + 1);
    }
    Ok(())
}
