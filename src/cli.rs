use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use parquet::basic::{Compression, GzipLevel, ZstdLevel};

use crate::convert::{DEFAULT_BATCH_SIZE, DEFAULT_ROW_GROUP_BYTES};

#[derive(Parser)]
#[command(name = "Name2Parquet")]
#[command(version = "0.1.0")]
#[command(about = "Converts assessor name TSV files into parquet.", long_about = None)]
pub struct Cli {
    /// Tab separated file to read, the first line is a header
    #[arg(value_name = "INPUT FILE", default_value = "name.tsv")]
    pub src: PathBuf,

    /// Parquet file to write
    #[arg(value_name = "DESTINATION FILE", default_value = "name.parquet")]
    pub dst: PathBuf,

    /// Stop after this many rows, 0 or less converts everything
    #[arg(
        short,
        long,
        default_value = "0",
        allow_negative_numbers = true,
        value_name = "ROWS"
    )]
    pub limit: i64,

    /// Compression codec for the parquet column chunks
    #[arg(short, long, value_enum, default_value_t = Codec::Snappy)]
    pub compression: Codec,

    /// Flush a row group once this many bytes are buffered
    #[arg(long, default_value_t = DEFAULT_ROW_GROUP_BYTES, value_name = "BYTES")]
    pub row_group_bytes: usize,

    /// Number of rows per arrow record batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "ROWS")]
    pub batch_size: usize,

    /// Write 0 for record ids that are not integers instead of failing
    #[arg(long)]
    pub lenient_ids: bool,

    /// Read the parquet file back and compare it with the input, record by record
    #[arg(long)]
    pub verify: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Codec {
    Snappy,
    Zstd,
    Gzip,
    Lz4,
    Uncompressed,
}

impl From<Codec> for Compression {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::Snappy => Compression::SNAPPY,
            Codec::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Codec::Gzip => Compression::GZIP(GzipLevel::default()),
            Codec::Lz4 => Compression::LZ4_RAW,
            Codec::Uncompressed => Compression::UNCOMPRESSED,
        }
    }
}
