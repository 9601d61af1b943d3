//! Core data models shared by the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};

/// One page of an opened PDF, as handed out by a document store.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Zero-based position in the document.
    pub index: usize,
    /// Native (embedded) text of the page; empty for scanned pages.
    pub native_text: String,
}

impl PdfPage {
    /// One-based page number as shown to users.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// An opened document: its filename, on-disk path, and pages in order.
#[derive(Debug, Clone)]
pub struct OpenedDocument {
    pub filename: String,
    pub path: std::path::PathBuf,
    pub pages: Vec<PdfPage>,
}

/// A segment of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub chunk_index: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(chunk_index: usize, text: String) -> Self {
        Self {
            id: chunk_id(chunk_index),
            chunk_index,
            text,
        }
    }
}

pub fn chunk_id(index: usize) -> String {
    format!("chunk_{}", index)
}

/// Chunks of the most recently indexed document, in document order.
///
/// Only ever replaced as a whole; see [`crate::ingest::DocumentIndexer`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalIndex {
    document: Option<String>,
    chunks: Vec<Chunk>,
}

impl RetrievalIndex {
    pub fn new(document: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        Self {
            document: Some(document.into()),
            chunks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Filename of the document these chunks came from.
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn get(&self, id: &str) -> Option<&Chunk> {
        let index = id.strip_prefix("chunk_")?.parse::<usize>().ok()?;
        self.chunks.get(index).filter(|c| c.id == id)
    }

    /// All chunk texts joined by blank lines.
    pub fn full_text(&self) -> String {
        self.chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Result of indexing one document.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub filename: String,
    /// Pages walked during this call; 0 when the text came from cache.
    pub pages_processed: usize,
    pub chunk_count: usize,
    pub char_count: usize,
    pub from_cache: bool,
    pub indexed_at: DateTime<Utc>,
}

impl IndexSummary {
    pub fn completion_message(&self) -> String {
        format!(
            "✅ In-depth Study completed:\n\
             - Full PDF processed successfully\n\
             - Created {} content chunks\n\
             - Ready for detailed queries\n\
             - Use 'query <your question>' to ask questions",
            self.chunk_count
        )
    }
}
