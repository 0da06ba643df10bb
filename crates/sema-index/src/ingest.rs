//! Ingestion adapters: newline-delimited files and streaming line sources.
//!
//! Each non-blank line becomes one document with id `line-{n}`, where `n` is
//! the 0-based line number. A line holding a JSON object with a `text` field
//! is read as a full document instead, so JSON-lines exports can be ingested
//! with their ids and metadata intact.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use sema_core::error::{Result, SemaError};
use sema_core::types::Document;

use crate::retriever::Retriever;

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Documents added to the index.
    pub indexed: usize,
    /// Lines that were not valid documents.
    pub skipped: usize,
    /// Batches rejected by the retriever.
    pub failed_batches: usize,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line_no: usize, line: &str) -> Option<Result<Document>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let default_id = format!("line-{}", line_no);

    if line.starts_with('{') {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(line) {
            return Some(Document::from_json(value, &default_id));
        }
    }
    Some(Ok(Document::new(default_id, line)))
}

/// Read every document from a newline-delimited file.
///
/// Invalid JSON documents are logged and skipped.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            SemaError::InvalidArgument(format!("input file not found: {}", path.display()))
        }
        _ => SemaError::Io(e),
    })?;

    let mut docs = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        match parse_line(line_no, line) {
            Some(Ok(doc)) => docs.push(doc),
            Some(Err(e)) => warn!(line = line_no, error = %e, "Skipping invalid document"),
            None => {}
        }
    }
    info!(path = %path.display(), count = docs.len(), "Read documents");
    Ok(docs)
}

/// Streaming consumer that indexes documents from a line source in batches.
pub struct StreamIngestor {
    retriever: Arc<Retriever>,
    batch_size: usize,
}

impl StreamIngestor {
    pub fn new(retriever: Arc<Retriever>, batch_size: usize) -> Self {
        Self {
            retriever,
            batch_size: batch_size.max(1),
        }
    }

    /// Consume `reader` until end of stream.
    ///
    /// A batch the retriever rejects is logged and counted, and consumption
    /// continues. Only read errors end the run early.
    pub async fn run<R>(&self, reader: R) -> Result<IngestReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut report = IngestReport::default();
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut lines = reader.lines();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            match parse_line(line_no, &line) {
                Some(Ok(doc)) => batch.push(doc),
                Some(Err(e)) => {
                    warn!(line = line_no, error = %e, "Skipping invalid document");
                    report.skipped += 1;
                }
                None => {}
            }
            line_no += 1;

            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut report).await;
            }
        }
        self.flush(&mut batch, &mut report).await;

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            failed_batches = report.failed_batches,
            "Stream ingestion finished"
        );
        Ok(report)
    }

    async fn flush(&self, batch: &mut Vec<Document>, report: &mut IngestReport) {
        if batch.is_empty() {
            return;
        }
        let docs = std::mem::take(batch);
        let size = docs.len();
        match self.retriever.index_documents(docs).await {
            Ok(count) => {
                debug!(count, "Batch indexed");
                report.indexed += count;
            }
            Err(e) => {
                warn!(error = %e, size, "Batch ingestion failed");
                report.failed_batches += 1;
            }
        }
    }
}
