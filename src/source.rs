use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result};
use csv::{ByteRecord, ErrorKind, Reader, ReaderBuilder};

/// Tab separated rows of a file whose first line is a header.
///
/// Every row must have as many fields as the header, a mismatch is reported
/// as an error with the offending line number. Field bytes are not decoded
/// here, so text in any encoding passes through.
pub struct LineSource<R: Read> {
    reader: Reader<R>,
    header: ByteRecord,
    exhausted: bool,
}

impl LineSource<BufReader<File>> {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("open input {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
            .with_context(|| format!("read header of {}", path.display()))
    }
}

impl<R: Read> LineSource<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let header = reader.byte_headers().context("parse header row")?.clone();
        Ok(Self {
            reader,
            header,
            exhausted: false,
        })
    }

    pub fn header(&self) -> &ByteRecord {
        &self.header
    }

    /// Next data row, or `None` once the input is exhausted.
    pub fn next_row(&mut self) -> Result<Option<ByteRecord>> {
        if self.exhausted {
            return Ok(None);
        }
        let mut row = ByteRecord::new();
        let more = self.reader.read_byte_record(&mut row).map_err(|err| {
            let stage = match err.kind() {
                ErrorKind::UnequalLengths { .. } => "malformed row",
                _ => "read input",
            };
            anyhow::Error::new(err).context(stage)
        })?;
        if more {
            Ok(Some(row))
        } else {
            self.exhausted = true;
            Ok(None)
        }
    }
}

impl<R: Read> Iterator for LineSource<R> {
    type Item = Result<ByteRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
