use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("malformed record at line {line}: {reason}")]
    MalformedInputRecord { line: usize, reason: String },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl InputError {
    /// Malformed lines are skipped; anything else ends the read.
    pub fn is_malformed(&self) -> bool {
        matches!(self, InputError::MalformedInputRecord { .. })
    }
}

/// Field-level checks applied after a line deserializes.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Reads newline-delimited JSON one record at a time.
pub struct JsonlReader<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
}

impl JsonlReader<BufReader<File>> {
    pub async fn open(path: &Path) -> Result<Self, InputError> {
        let file = File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: AsyncBufRead + Unpin> JsonlReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
        }
    }

    /// Next record, `Ok(None)` at end of input.
    ///
    /// A `MalformedInputRecord` error consumes its line, so the caller can
    /// log it and keep reading.
    pub async fn next_record<T>(&mut self) -> Result<Option<T>, InputError>
    where
        T: DeserializeOwned + Validate,
    {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line_no = self.line_no;
            let malformed = |reason: String| InputError::MalformedInputRecord {
                line: line_no,
                reason,
            };

            // Invalid UTF-8 is a bad record, not a broken stream
            let line = std::str::from_utf8(&self.buf).map_err(|e| malformed(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record: T = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
            record.validate().map_err(malformed)?;

            return Ok(Some(record));
        }
    }
}
