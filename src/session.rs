//! A study session: everything one user works with, in one value.
//!
//! [`StudySession`] owns the generation gateway, the formula cache and its
//! durable store, the document-text cache and the retrieval index of the
//! document currently under study. Construct it with [`StudySession::open`]
//! (loads the formula store, checks the model file) and finish with
//! [`StudySession::close`] (flushes the store).
//!
//! Every operation runs to completion on the caller's thread and reports
//! milestones to the supplied [`ProgressSink`].

use anyhow::Result;

use crate::config::Config;
use crate::documents::{DocumentStore, PdfDirectory};
use crate::error::StudyError;
use crate::extract::PageExtractor;
use crate::formula::{FormulaAnswer, FormulaCache, FormulaStore};
use crate::generation::{GenerationBackend, GenerationGateway, HttpCompletionBackend};
use crate::ingest::{DocumentCache, DocumentIndexer};
use crate::models::{IndexSummary, RetrievalIndex};
use crate::progress::ProgressSink;
use crate::prompt::{self, TaskKind};
use crate::search::{join_context, KeywordRetriever, Retriever};

/// A generated answer and the task that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub task: TaskKind,
    pub text: String,
}

impl Answer {
    /// User-facing rendering with the task's banner, if it has one.
    pub fn render(&self) -> String {
        match self.task {
            TaskKind::DocumentQa => format!("📄 PDF Answer:\n{}", self.text),
            TaskKind::InDepthQa => format!("📚 Detailed Answer:\n{}", self.text),
            TaskKind::OpenSearch => format!("🔍 Search Result:\n{}", self.text),
            _ => self.text.clone(),
        }
    }
}

pub struct StudySession {
    config: Config,
    documents: Box<dyn DocumentStore>,
    indexer: DocumentIndexer,
    document_cache: DocumentCache,
    retrieval: RetrievalIndex,
    retriever: Box<dyn Retriever>,
    formulas: FormulaCache,
    gateway: GenerationGateway,
}

impl StudySession {
    /// Opens a session with the default collaborators: the configured PDF
    /// directory, process-backed OCR, and the HTTP completion backend.
    ///
    /// Fails with [`StudyError::ModelUnavailable`] when the model file is
    /// missing.
    pub fn open(config: Config) -> Result<Self> {
        let backend = HttpCompletionBackend::new(&config.model)?;
        let documents = PdfDirectory::new(config.paths.documents_dir.clone());
        let extractor = PageExtractor::from_config(&config.ocr);
        Ok(Self::with_parts(
            config,
            Box::new(backend),
            Box::new(documents),
            extractor,
        ))
    }

    /// Opens a session around caller-supplied collaborators.
    pub fn with_parts(
        config: Config,
        backend: Box<dyn GenerationBackend>,
        documents: Box<dyn DocumentStore>,
        extractor: PageExtractor,
    ) -> Self {
        let store = FormulaStore::load(config.paths.formulas_file.clone());
        let formulas = FormulaCache::new(store, config.cache.formula_capacity);
        let document_cache = DocumentCache::new(
            config.cache.document_capacity,
            config.cache.verify_fingerprint,
        );
        let indexer = DocumentIndexer::new(extractor, config.chunking.max_chars);
        let gateway = GenerationGateway::from_config(backend, &config.generation);

        Self {
            config,
            documents,
            indexer,
            document_cache,
            retrieval: RetrievalIndex::default(),
            retriever: Box::new(KeywordRetriever),
            formulas,
            gateway,
        }
    }

    pub fn with_retriever(mut self, retriever: Box<dyn Retriever>) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn retrieval_index(&self) -> &RetrievalIndex {
        &self.retrieval
    }

    pub fn formula_cache(&self) -> &FormulaCache {
        &self.formulas
    }

    pub fn document_cache(&self) -> &DocumentCache {
        &self.document_cache
    }

    pub fn list_documents(&self) -> Result<Vec<String>> {
        self.documents.list_documents()
    }

    /// Formula lookup through the two-tier cache.
    pub fn ask_formula(&mut self, query: &str, sink: &mut dyn ProgressSink) -> Result<FormulaAnswer> {
        sink.on_status("Processing...");
        let answer = self.formulas.get(query, &self.gateway)?;
        sink.on_status("Done.");
        Ok(answer)
    }

    /// Answers `question` from the first pages of `filename` without indexing.
    pub fn query_document(
        &mut self,
        filename: &str,
        question: &str,
        sink: &mut dyn ProgressSink,
    ) -> Result<Answer> {
        if filename.trim().is_empty() {
            return Err(StudyError::invalid("No PDF selected.").into());
        }
        let question = require_text(question, "Please enter a question.")?;

        let retrieval = &self.config.retrieval;
        let doc = self
            .documents
            .open_prefix(filename, retrieval.document_qa_pages)?;
        let text: String = doc.pages.iter().map(|p| p.native_text.as_str()).collect();

        if text.trim().is_empty() {
            tracing::warn!("The document is empty or unreadable.");
            return Err(StudyError::EmptyDocument(filename.to_string()).into());
        }

        let prompt = prompt::document_qa(&text, question, retrieval.document_qa_chars);
        self.run(TaskKind::DocumentQa, &prompt, sink)
    }

    /// Extracts, segments and indexes `filename`, replacing the current index.
    pub fn index_document(
        &mut self,
        filename: &str,
        sink: &mut dyn ProgressSink,
    ) -> Result<IndexSummary> {
        if filename.trim().is_empty() {
            return Err(StudyError::invalid("No PDF selected.").into());
        }
        let summary = self.indexer.index(
            self.documents.as_ref(),
            &mut self.document_cache,
            &mut self.retrieval,
            filename,
            sink,
        );
        if let Err(e) = &summary {
            tracing::error!("Failed to index chapter: {:#}", e);
        }
        summary
    }

    /// First-pass answer from the indexed chapter. Runs even when nothing is
    /// indexed or nothing matches, with an empty context.
    pub fn answer_from_chapter(
        &mut self,
        question: &str,
        sink: &mut dyn ProgressSink,
    ) -> Result<Answer> {
        let question = require_text(question, "Please enter a question.")?;
        let context = self.context_for(question, self.config.retrieval.chapter_limit);
        let prompt = prompt::chapter_qa(&context, question);
        self.run(TaskKind::ChapterQa, &prompt, sink)
    }

    /// Detailed answer from the indexed chapter. Requires a prior index.
    pub fn in_depth_query(&mut self, question: &str, sink: &mut dyn ProgressSink) -> Result<Answer> {
        self.require_index()?;
        let question = require_text(question, "Please enter a question.")?;
        let context = self.context_for(question, self.config.retrieval.in_depth_limit);
        let prompt = prompt::in_depth_qa(&context, question);
        self.run(TaskKind::InDepthQa, &prompt, sink)
    }

    /// Bullet-point summary of the indexed chapter. Requires a prior index.
    pub fn summarize_chapter(&mut self, sink: &mut dyn ProgressSink) -> Result<Answer> {
        self.require_index()?;
        let text = self.retrieval.full_text();
        let prompt = prompt::summary(&text, self.config.retrieval.summary_chars);
        self.run(TaskKind::Summary, &prompt, sink)
    }

    /// General-knowledge answer without any document context.
    pub fn search(&mut self, question: &str, sink: &mut dyn ProgressSink) -> Result<Answer> {
        let question = require_text(question, "Please enter a question.")?;
        let prompt = prompt::open_search(question);
        self.run(TaskKind::OpenSearch, &prompt, sink)
    }

    /// Drops the retrieval index, cached document text, and all formula
    /// answers (in memory and on disk).
    pub fn clear_caches(&mut self) -> Result<()> {
        self.retrieval = RetrievalIndex::default();
        self.document_cache.clear();
        self.formulas.clear()
    }

    /// Flushes pending formula writes.
    pub fn close(mut self) -> Result<()> {
        self.formulas.flush()
    }

    fn require_index(&self) -> Result<()> {
        if self.retrieval.is_empty() {
            return Err(StudyError::invalid("Please complete In-depth Study first").into());
        }
        Ok(())
    }

    fn context_for(&self, question: &str, limit: usize) -> String {
        let hits = self.retriever.retrieve(&self.retrieval, question, limit);
        tracing::debug!("retrieved {} of {} chunks", hits.len(), self.retrieval.len());
        join_context(&hits)
    }

    fn run(&self, task: TaskKind, prompt: &str, sink: &mut dyn ProgressSink) -> Result<Answer> {
        sink.on_status("Processing...");
        tracing::info!(task = task.label(), prompt_chars = prompt.len(), "generating");
        let text = self.gateway.generate(prompt)?;
        sink.on_status("Done.");
        Ok(Answer { task, text })
    }
}

impl Drop for StudySession {
    fn drop(&mut self) {
        if let Err(e) = self.formulas.flush() {
            tracing::error!("Failed to flush formula store: {:#}", e);
        }
    }
}

fn require_text<'a>(text: &'a str, message: &str) -> Result<&'a str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StudyError::invalid(message).into());
    }
    Ok(trimmed)
}
