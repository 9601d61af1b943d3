//! TOML configuration parsing.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`load_or_default`]) yields a working configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    #[serde(default = "default_formulas_file")]
    pub formulas_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            formulas_file: default_formulas_file(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("documents")
}
fn default_formulas_file() -> PathBuf {
    PathBuf::from("formulas.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_model_file")]
    pub file: String,
    /// Base URL of the local completion server hosting the model.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds; 0 leaves the call unbounded.
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            file: default_model_file(),
            endpoint: default_endpoint(),
            timeout_secs: 0,
        }
    }
}

impl ModelConfig {
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}
fn default_model_file() -> String {
    "mistral-7b-instruct-v0.1.Q4_0.gguf".to_string()
}
fn default_endpoint() -> String {
    "http://127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_k() -> u32 {
    40
}
fn default_top_p() -> f32 {
    0.4
}
fn default_repeat_penalty() -> f32 {
    1.18
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    crate::chunk::DEFAULT_MAX_CHUNK_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_chapter_limit")]
    pub chapter_limit: usize,
    #[serde(default = "default_in_depth_limit")]
    pub in_depth_limit: usize,
    #[serde(default = "default_document_qa_pages")]
    pub document_qa_pages: usize,
    #[serde(default = "default_document_qa_chars")]
    pub document_qa_chars: usize,
    #[serde(default = "default_summary_chars")]
    pub summary_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chapter_limit: default_chapter_limit(),
            in_depth_limit: default_in_depth_limit(),
            document_qa_pages: default_document_qa_pages(),
            document_qa_chars: default_document_qa_chars(),
            summary_chars: default_summary_chars(),
        }
    }
}

fn default_chapter_limit() -> usize {
    3
}
fn default_in_depth_limit() -> usize {
    5
}
fn default_document_qa_pages() -> usize {
    10
}
fn default_document_qa_chars() -> usize {
    crate::prompt::DOCUMENT_QA_CHAR_BUDGET
}
fn default_summary_chars() -> usize {
    crate::prompt::SUMMARY_CHAR_BUDGET
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_formula_capacity")]
    pub formula_capacity: usize,
    #[serde(default = "default_document_capacity")]
    pub document_capacity: usize,
    /// Re-extract a cached document when its bytes have changed.
    #[serde(default = "default_verify_fingerprint")]
    pub verify_fingerprint: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            formula_capacity: default_formula_capacity(),
            document_capacity: default_document_capacity(),
            verify_fingerprint: default_verify_fingerprint(),
        }
    }
}

fn default_formula_capacity() -> usize {
    100
}
fn default_document_capacity() -> usize {
    16
}
fn default_verify_fingerprint() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub classify_images: bool,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: String,
    #[serde(default = "default_tesseract")]
    pub tesseract: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            classify_images: true,
            dpi: default_dpi(),
            scratch_dir: default_scratch_dir(),
            pdftoppm: default_pdftoppm(),
            tesseract: default_tesseract(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_dpi() -> u32 {
    300
}
fn default_scratch_dir() -> PathBuf {
    PathBuf::from("images")
}
fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}
fn default_tesseract() -> String {
    "tesseract".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Loads `path` when it exists, otherwise falls back to the defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!("no config at {}, using defaults", path.display());
        Ok(Config::default())
    }
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }

    let r = &config.retrieval;
    if r.chapter_limit == 0 || r.in_depth_limit == 0 {
        anyhow::bail!("retrieval.chapter_limit and retrieval.in_depth_limit must be >= 1");
    }
    if r.document_qa_pages == 0 {
        anyhow::bail!("retrieval.document_qa_pages must be >= 1");
    }

    if config.cache.formula_capacity == 0 || config.cache.document_capacity == 0 {
        anyhow::bail!("cache capacities must be >= 1");
    }

    let g = &config.generation;
    if g.max_attempts == 0 {
        anyhow::bail!("generation.max_attempts must be >= 1");
    }
    if g.temperature < 0.0 {
        anyhow::bail!("generation.temperature must be >= 0.0");
    }
    if !(0.0..=1.0).contains(&g.top_p) {
        anyhow::bail!("generation.top_p must be in [0.0, 1.0]");
    }

    if config.ocr.dpi == 0 {
        anyhow::bail!("ocr.dpi must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn empty_file_yields_defaults() {
        let f = write_config("");
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.retrieval.chapter_limit, 3);
        assert_eq!(config.retrieval.in_depth_limit, 5);
        assert_eq!(config.cache.formula_capacity, 100);
        assert_eq!(config.generation.max_attempts, 3);
        assert_eq!(config.generation.top_k, 40);
        assert!(config.cache.verify_fingerprint);
        assert_eq!(
            config.model.model_path(),
            PathBuf::from("models/mistral-7b-instruct-v0.1.Q4_0.gguf")
        );
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let f = write_config("[generation]\nbackoff_ms = 0\n\n[cache]\nverify_fingerprint = false\n");
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.generation.backoff_ms, 0);
        assert_eq!(config.generation.max_tokens, 2048);
        assert!(!config.cache.verify_fingerprint);
        assert_eq!(config.cache.document_capacity, 16);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let f = write_config("[chunking]\nmax_chars = 0\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("max_chars"));
    }

    #[test]
    fn top_p_out_of_range_rejected() {
        let f = write_config("[generation]\ntop_p = 1.5\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.paths.formulas_file, PathBuf::from("formulas.json"));
    }
}
