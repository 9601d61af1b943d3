//! # Study Harness
//!
//! A local study assistant over a directory of PDF chapters and a locally
//! served language model.
//!
//! Study Harness extracts chapter text page by page (falling back to OCR for
//! scanned pages), segments it into paragraph-bounded chunks, and answers
//! questions from the chunks that mention the question's words. Formula
//! lookups go through a two-tier cache: an in-memory LRU keyed by the raw
//! query and a durable JSON store keyed by a normalized form of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Documents  │──▶│  Extract    │──▶│   Ingest     │
//! │  PDF dir    │   │ native/OCR  │   │ cache+chunk  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ RetrievalIndex
//!        ┌──────────┐   ┌──────────┐   ┌─────▼──────┐   ┌────────────┐
//!        │ Formula  │──▶│  Prompt  │◀──│  Search    │   │ Generation │
//!        │ LRU+JSON │   └────┬─────┘   └────────────┘   │ retry/HTTP │
//!        └──────────┘        └─────────────────────────▶└────────────┘
//! ```
//!
//! Everything hangs off a [`session::StudySession`], which the `study` CLI
//! and its interactive shell drive.
//!
//! ## Quick Start
//!
//! ```bash
//! study list
//! study ask "kinetic energy"
//! study pdf chapter3.pdf "what is torque?"
//! study study chapter3.pdf --question "explain angular momentum"
//! study shell
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`documents`] | PDF directory access and fingerprints |
//! | [`ocr`] | Rasterization, OCR and image classification |
//! | [`extract`] | Per-page text with OCR fallback |
//! | [`chunk`] | Paragraph-aware segmentation |
//! | [`ingest`] | Document cache and indexing |
//! | [`search`] | Keyword chunk retrieval |
//! | [`formula`] | Formula cache and durable store |
//! | [`generation`] | Model gateway with retries |
//! | [`prompt`] | Prompt templates |
//! | [`session`] | Session state and operations |
//! | [`shell`] | Interactive command loop |

pub mod chunk;
pub mod config;
pub mod documents;
pub mod error;
pub mod extract;
pub mod formula;
pub mod generation;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod ocr;
pub mod progress;
pub mod prompt;
pub mod search;
pub mod session;
pub mod shell;
