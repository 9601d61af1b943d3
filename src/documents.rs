//! Document store: the directory of PDFs a session studies from.
//!
//! [`DocumentStore`] is the list/open seam used by the indexer.
//! [`PdfDirectory`] reads native page text with `pdf-extract` and falls back
//! to `lopdf` when `pdf-extract` errors or panics on a malformed file. Prefix
//! reads go straight to `lopdf` so pages past the limit are never parsed.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::StudyError;
use crate::models::{OpenedDocument, PdfPage};

pub trait DocumentStore: Send + Sync {
    /// PDF filenames in the store, sorted.
    fn list_documents(&self) -> Result<Vec<String>>;

    /// Path of `filename`, or [`StudyError::NotFound`].
    fn resolve(&self, filename: &str) -> Result<PathBuf>;

    /// All pages of `filename` in order, with their native text.
    fn open(&self, filename: &str) -> Result<OpenedDocument>;

    /// Only the first `max_pages` pages. Defaults to [`open`](Self::open) + truncate.
    fn open_prefix(&self, filename: &str, max_pages: usize) -> Result<OpenedDocument> {
        let mut doc = self.open(filename)?;
        doc.pages.truncate(max_pages);
        Ok(doc)
    }

    /// Content hash of the file; used to detect edits under the same name.
    fn fingerprint(&self, filename: &str) -> Result<String>;
}

/// A flat directory of `*.pdf` files.
pub struct PdfDirectory {
    root: PathBuf,
}

impl PdfDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentStore for PdfDirectory {
    fn list_documents(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            tracing::warn!("documents directory {} does not exist", self.root.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry
                .with_context(|| format!("Failed to list {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.to_lowercase().ends_with(".pdf") {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let path = self.root.join(filename);
        // Names are plain filenames inside the directory, never paths.
        let plain = Path::new(filename).file_name().and_then(|n| n.to_str()) == Some(filename);
        if !plain || !path.is_file() {
            return Err(StudyError::NotFound(filename.to_string()).into());
        }
        Ok(path)
    }

    fn open(&self, filename: &str) -> Result<OpenedDocument> {
        let path = self.resolve(filename)?;
        let texts = read_page_texts(&path).map_err(|reason| StudyError::ExtractionFailure {
            target: filename.to_string(),
            reason,
        })?;
        Ok(opened(filename, path, texts))
    }

    fn open_prefix(&self, filename: &str, max_pages: usize) -> Result<OpenedDocument> {
        let path = self.resolve(filename)?;
        match read_page_texts_lopdf(&path, Some(max_pages)) {
            Ok(texts) => Ok(opened(filename, path, texts)),
            Err(reason) => {
                tracing::warn!("lopdf could not read {}, parsing all pages: {}", filename, reason);
                let mut doc = self.open(filename)?;
                doc.pages.truncate(max_pages);
                Ok(doc)
            }
        }
    }

    fn fingerprint(&self, filename: &str) -> Result<String> {
        let path = self.resolve(filename)?;
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(sha256_hex(&bytes))
    }
}

fn opened(filename: &str, path: PathBuf, texts: Vec<String>) -> OpenedDocument {
    let pages = texts
        .into_iter()
        .enumerate()
        .map(|(index, native_text)| PdfPage { index, native_text })
        .collect();
    OpenedDocument {
        filename: filename.to_string(),
        path,
        pages,
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Native text of every page. `pdf-extract` first; `lopdf` if it fails.
fn read_page_texts(path: &Path) -> std::result::Result<Vec<String>, String> {
    let primary = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_by_pages(path)
    }));

    match primary {
        Ok(Ok(pages)) => return Ok(pages),
        Ok(Err(e)) => {
            tracing::warn!("pdf-extract failed for {}, trying lopdf: {}", path.display(), e)
        }
        Err(_) => tracing::warn!("pdf-extract panicked for {}, trying lopdf", path.display()),
    }

    read_page_texts_lopdf(path, None)
}

/// Native text via `lopdf`, stopping after `limit` pages when given.
fn read_page_texts_lopdf(
    path: &Path,
    limit: Option<usize>,
) -> std::result::Result<Vec<String>, String> {
    let doc = lopdf::Document::load(path).map_err(|e| format!("Failed to load PDF: {}", e))?;
    let pages = doc
        .get_pages()
        .keys()
        .take(limit.unwrap_or(usize::MAX))
        .map(|&number| match doc.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("lopdf could not read page {} of {}: {}", number, path.display(), e);
                String::new()
            }
        })
        .collect();
    Ok(pages)
}
