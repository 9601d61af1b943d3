//! Formula answers: a durable JSON store fronted by an in-memory LRU.
//!
//! Lookups go through two tiers:
//!
//! 1. [`FormulaCache`] keeps the last `capacity` answers keyed by the *raw*
//!    query string, so repeating a query verbatim never leaves memory.
//! 2. [`FormulaStore`] maps *normalized* queries to answers and is persisted
//!    to disk after every new generation.
//!
//! Normalization lowercases, splits on whitespace and drops a fixed list of
//! filler words, so "the formula for velocity" and "velocity equation" share
//! one stored answer. The collision is deliberate.
//!
//! On disk the store is `{"formulas": {"<normalized query>": "<answer>"}}`.
//! A missing, unreadable or malformed file is replaced by the empty default.

use anyhow::{Context, Result};
use lru::LruCache;
use serde::Serialize;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::error::StudyError;
use crate::generation::GenerationGateway;
use crate::prompt;

/// Words dropped from a query before it is used as a store key.
pub const STOP_WORDS: [&str; 9] = [
    "the", "a", "an", "of", "for", "to", "in", "formula", "equation",
];

pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Serialize)]
struct StoreFile<'a> {
    formulas: &'a BTreeMap<String, String>,
}

/// Durable map of normalized query → generated answer.
#[derive(Debug)]
pub struct FormulaStore {
    path: PathBuf,
    formulas: BTreeMap<String, String>,
    dirty: bool,
    recovered: bool,
}

impl FormulaStore {
    /// Loads the store at `path`. Never fails: a bad or missing file is
    /// logged, reset to the empty default, and rewritten.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !path.exists() {
            tracing::info!("formula store {} not found, creating it", path.display());
            let mut store = Self {
                path,
                formulas: BTreeMap::new(),
                dirty: true,
                recovered: false,
            };
            if let Err(e) = store.persist() {
                tracing::error!("Failed to create formula store: {:#}", e);
            }
            return store;
        }

        match read_store(&path) {
            Ok(formulas) => {
                tracing::info!(
                    "formula store {} loaded ({} entries)",
                    path.display(),
                    formulas.len()
                );
                Self {
                    path,
                    formulas,
                    dirty: false,
                    recovered: false,
                }
            }
            Err(err) => {
                tracing::error!("{}. Resetting to default.", err);
                let mut store = Self {
                    path,
                    formulas: BTreeMap::new(),
                    dirty: true,
                    recovered: true,
                };
                if let Err(e) = store.persist() {
                    tracing::error!("Failed to rewrite formula store: {:#}", e);
                }
                store
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the last load had to reset the file.
    pub fn was_recovered(&self) -> bool {
        self.recovered
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.formulas.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Stores `answer` under `key` (overwriting) and writes the file. The
    /// in-memory entry is kept even when the write fails.
    pub fn insert(&mut self, key: String, answer: String) -> Result<()> {
        self.formulas.insert(key, answer);
        self.dirty = true;
        self.persist()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.formulas.clear();
        self.dirty = true;
        self.persist()
    }

    /// Writes pending changes, if any.
    pub fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&StoreFile {
            formulas: &self.formulas,
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        // Replace atomically: readers see the old file or the new one.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        self.dirty = false;
        Ok(())
    }
}

fn read_store(path: &Path) -> std::result::Result<BTreeMap<String, String>, StudyError> {
    let corrupt = |reason: String| StudyError::CorruptPersistentState {
        path: path.display().to_string(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| corrupt(e.to_string()))?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("invalid JSON: {}", e)))?;

    let obj = value
        .as_object()
        .ok_or_else(|| corrupt("top level is not an object".to_string()))?;

    match obj.get("formulas") {
        None => Ok(BTreeMap::new()),
        Some(formulas) => serde_json::from_value(formulas.clone())
            .map_err(|_| corrupt("'formulas' is not a map of strings".to_string())),
    }
}

/// Where a returned answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOrigin {
    /// Served from the durable store.
    Stored,
    /// Freshly generated (and persisted).
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaAnswer {
    pub key: String,
    pub text: String,
    pub origin: AnswerOrigin,
}

impl FormulaAnswer {
    /// User-facing rendering with the origin banner.
    pub fn render(&self) -> String {
        match self.origin {
            AnswerOrigin::Stored => format!("📘 From Database:\n{}", self.text),
            AnswerOrigin::Generated => format!("🧮 **Formula Result:**\n{}", self.text),
        }
    }
}

/// Per-tier lookup counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub recent_hits: u64,
    pub store_hits: u64,
    pub generated: u64,
}

pub struct FormulaCache {
    recent: LruCache<String, FormulaAnswer>,
    store: FormulaStore,
    stats: CacheStats,
}

impl FormulaCache {
    pub fn new(store: FormulaStore, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            recent: LruCache::new(capacity),
            store,
            stats: CacheStats::default(),
        }
    }

    pub fn store(&self) -> &FormulaStore {
        &self.store
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Whether `raw_query` is held in the in-memory tier. Does not touch
    /// recency.
    pub fn is_recent(&self, raw_query: &str) -> bool {
        self.recent.contains(raw_query)
    }

    /// Answer for `query`, generating and persisting it on a full miss.
    ///
    /// A repeated raw query is answered from memory exactly as it was first
    /// returned. A failed store write is logged and the answer still returned.
    pub fn get(&mut self, query: &str, gateway: &GenerationGateway) -> Result<FormulaAnswer> {
        if query.trim().is_empty() {
            return Err(StudyError::invalid("Please enter a formula query.").into());
        }

        if let Some(hit) = self.recent.get(query) {
            self.stats.recent_hits += 1;
            tracing::debug!("formula '{}' served from memory", query);
            return Ok(hit.clone());
        }

        let key = normalize_query(query);
        tracing::info!("Original query: '{}' normalized to: '{}'", query, key);
        if key.is_empty() {
            return Err(StudyError::invalid(format!(
                "'{}' has nothing to look up once filler words are removed.",
                query.trim()
            ))
            .into());
        }

        let answer = match self.store.get(&key) {
            Some(text) => {
                self.stats.store_hits += 1;
                tracing::info!("Formula for '{}' found in database.", key);
                FormulaAnswer {
                    key: key.clone(),
                    text: text.to_string(),
                    origin: AnswerOrigin::Stored,
                }
            }
            None => {
                tracing::info!("Formula for '{}' not found. Generating...", key);
                let text = gateway.generate(&prompt::formula(query))?;
                self.stats.generated += 1;
                match self.store.insert(key.clone(), text.clone()) {
                    Ok(()) => tracing::info!(
                        "Formula for '{}' saved to {}.",
                        key,
                        self.store.path().display()
                    ),
                    Err(e) => tracing::error!("Failed to save formula to file: {:#}", e),
                }
                FormulaAnswer {
                    key,
                    text,
                    origin: AnswerOrigin::Generated,
                }
            }
        };

        self.recent.put(query.to_string(), answer.clone());
        Ok(answer)
    }

    /// Empties both tiers and rewrites the store file.
    pub fn clear(&mut self) -> Result<()> {
        self.recent.clear();
        self.store.clear()
    }

    /// Writes any unsaved store changes.
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }
}
