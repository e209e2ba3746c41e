use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use extract::ArticleRecord;

/// Destination for merged article records.
#[async_trait]
pub trait RecordSink: Send {
    async fn write(&mut self, record: &ArticleRecord) -> Result<()>;

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonlSink<W> {
    writer: W,
}

impl JsonlSink<BufWriter<File>> {
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create output directory: {:?}", parent))?;
        }
        let file = File::create(path)
            .await
            .context(format!("Failed to create output file: {:?}", path))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: AsyncWrite + Unpin + Send> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> RecordSink for JsonlSink<W> {
    async fn write(&mut self, record: &ArticleRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .await
            .context("Failed to write record")?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.context("Failed to flush records")
    }
}

#[async_trait]
impl RecordSink for Vec<ArticleRecord> {
    async fn write(&mut self, record: &ArticleRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}
