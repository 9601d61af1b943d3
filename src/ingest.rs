//! Document indexing ("in-depth study").
//!
//! Coordinates the per-document flow: resolve → cached text or page-by-page
//! extraction → segmentation → wholesale replacement of the retrieval index.
//!
//! Extracted text is kept in a [`DocumentCache`] keyed by filename so that
//! re-studying a document skips extraction. The cache is bounded (LRU by
//! filename) and, unless `verify_fingerprint` is off, each entry remembers
//! the SHA-256 of the file it was read from and is ignored once the file
//! changes. With verification off an edited file keeps serving its old text
//! until the cache is cleared or the process restarts.

use anyhow::Result;
use chrono::Utc;
use lru::LruCache;
use std::num::NonZeroUsize;

use crate::chunk::chunk_text;
use crate::documents::DocumentStore;
use crate::extract::PageExtractor;
use crate::models::{IndexSummary, RetrievalIndex};
use crate::progress::{percent, ProgressSink};

#[derive(Debug, Clone)]
pub struct CachedText {
    pub text: String,
    /// `None` when fingerprints are not being tracked.
    pub fingerprint: Option<String>,
    pub page_count: usize,
}

/// Full extracted text per filename, process lifetime only.
pub struct DocumentCache {
    entries: LruCache<String, CachedText>,
    verify_fingerprint: bool,
}

impl DocumentCache {
    pub fn new(capacity: usize, verify_fingerprint: bool) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            verify_fingerprint,
        }
    }

    pub fn verifies_fingerprint(&self) -> bool {
        self.verify_fingerprint
    }

    /// Cached text for `filename`, if present and still current.
    ///
    /// An entry whose fingerprint differs from `fingerprint` is dropped.
    pub fn lookup(&mut self, filename: &str, fingerprint: Option<&str>) -> Option<&CachedText> {
        let stale = match self.entries.peek(filename) {
            None => return None,
            Some(entry) => {
                self.verify_fingerprint && entry.fingerprint.as_deref() != fingerprint
            }
        };
        if stale {
            tracing::info!("{} changed on disk; dropping cached text", filename);
            self.entries.pop(filename);
            return None;
        }
        self.entries.get(filename)
    }

    pub fn insert(&mut self, filename: &str, entry: CachedText) {
        if let Some((evicted, _)) = self.entries.push(filename.to_string(), entry) {
            if evicted != filename {
                tracing::debug!("document cache full; evicted {}", evicted);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains(filename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Page marker written ahead of each page's text. Doubles as a paragraph
/// boundary for the segmenter.
pub fn page_header(number: usize) -> String {
    format!("\n=== Page {} ===\n", number)
}

pub struct DocumentIndexer {
    extractor: PageExtractor,
    max_chunk_chars: usize,
}

impl DocumentIndexer {
    pub fn new(extractor: PageExtractor, max_chunk_chars: usize) -> Self {
        Self {
            extractor,
            max_chunk_chars,
        }
    }

    /// Index `filename` and replace `target` with its chunks.
    ///
    /// `target` is only assigned once the new chunks are complete; on error
    /// it still holds the previous document.
    pub fn index(
        &self,
        store: &dyn DocumentStore,
        cache: &mut DocumentCache,
        target: &mut RetrievalIndex,
        filename: &str,
        sink: &mut dyn ProgressSink,
    ) -> Result<IndexSummary> {
        tracing::info!("Starting in-depth study of: {}", filename);
        store.resolve(filename)?;

        let fingerprint = if cache.verifies_fingerprint() {
            Some(store.fingerprint(filename)?)
        } else {
            None
        };

        let (text, pages_processed, from_cache) =
            match cache.lookup(filename, fingerprint.as_deref()) {
                Some(hit) => {
                    tracing::info!("Using cached text for {} ({} pages)", filename, hit.page_count);
                    sink.on_status(&format!("Using cached text for {}", filename));
                    sink.on_progress(100);
                    (hit.text.clone(), 0, true)
                }
                None => {
                    let (text, page_count) = self.extract_document(store, filename, sink)?;
                    cache.insert(
                        filename,
                        CachedText {
                            text: text.clone(),
                            fingerprint,
                            page_count,
                        },
                    );
                    (text, page_count, false)
                }
            };

        let chunks = chunk_text(&text, self.max_chunk_chars);
        let summary = IndexSummary {
            filename: filename.to_string(),
            pages_processed,
            chunk_count: chunks.len(),
            char_count: text.chars().count(),
            from_cache,
            indexed_at: Utc::now(),
        };

        *target = RetrievalIndex::new(filename, chunks);
        tracing::info!("Successfully indexed {} chunks", summary.chunk_count);
        Ok(summary)
    }

    fn extract_document(
        &self,
        store: &dyn DocumentStore,
        filename: &str,
        sink: &mut dyn ProgressSink,
    ) -> Result<(String, usize)> {
        let doc = store.open(filename)?;
        let total = doc.pages.len();
        tracing::info!("Processing all {} pages...", total);

        let mut full_text = String::new();
        for page in &doc.pages {
            if page.index % 5 == 0 {
                tracing::info!("Processing page {}/{}", page.number(), total);
            }

            let text = self.extractor.extract(&doc.path, page);
            full_text.push_str(&page_header(page.number()));
            full_text.push_str(&text);
            full_text.push('\n');

            sink.on_progress(percent(page.number(), total));
            sink.on_status(&format!("Processing page {}/{}", page.number(), total));
        }

        tracing::info!("Completed processing {} pages", total);
        Ok((full_text, total))
    }
}
