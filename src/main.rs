//! # Study Harness CLI (`study`)
//!
//! The `study` binary answers questions about PDF chapters in the documents
//! directory using a locally served model.
//!
//! ## Usage
//!
//! ```bash
//! study --config ./config/study.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `study list` | List PDFs in the documents directory |
//! | `study ask "<query>"` | Look up a formula (cached) |
//! | `study search "<question>"` | General-knowledge answer, no documents |
//! | `study pdf <file> "<question>"` | Answer from the first pages of a PDF |
//! | `study study <file> [question]` | Index a PDF, optionally ask about it |
//! | `study summary <file>` | Index a PDF and summarize it |
//! | `study shell` | Interactive session |
//!
//! ## Examples
//!
//! ```bash
//! # Which chapters are available?
//! study list
//!
//! # Formula lookup; repeated lookups are served from formulas.json
//! study ask "kinetic energy"
//!
//! # Study a chapter, then ask a detailed question about it
//! study study chapter3.pdf "how is angular momentum conserved?"
//!
//! # Machine-readable progress on stderr
//! study --progress json summary chapter3.pdf
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use study_harness::config;
use study_harness::documents::{DocumentStore, PdfDirectory};
use study_harness::logging;
use study_harness::progress::{ProgressMode, ProgressSink};
use study_harness::session::StudySession;
use study_harness::shell::{self, render_list};

/// Study Harness CLI — ask questions about PDF chapters with a local model.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the default path does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "study",
    about = "Study Harness — ask questions about PDF chapters with a local model",
    version,
    long_about = "Study Harness extracts text from PDF chapters (with OCR for scanned pages), \
    indexes it into paragraph chunks, and answers formula, document and chapter questions \
    through a locally served language model."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/study.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List PDFs in the documents directory.
    List,

    #[command(flatten)]
    Session(SessionCommand),
}

/// Commands that run against an open [`StudySession`] and need the model.
#[derive(Subcommand)]
enum SessionCommand {
    /// Look up a formula.
    ///
    /// Equivalent queries ("the kinetic energy", "Kinetic Energy") share one
    /// stored answer in the formula store.
    Ask {
        /// The formula to look up.
        query: String,
    },

    /// General-knowledge search, without document context.
    Search {
        /// The question to answer.
        question: String,
    },

    /// Answer a question from the first pages of a PDF, without indexing it.
    Pdf {
        /// PDF filename inside the documents directory.
        file: String,
        /// The question to answer.
        question: String,
    },

    /// Study a PDF in depth: extract every page and index it.
    ///
    /// With a question, answers it from the indexed chapter afterwards.
    Study {
        /// PDF filename inside the documents directory.
        file: String,
        /// Optional follow-up question.
        question: Option<String>,
    },

    /// Index a PDF and print a bullet-point summary of it.
    Summary {
        /// PDF filename inside the documents directory.
        file: String,
    },

    /// Start an interactive session.
    Shell,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init() {
        eprintln!("{:#}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_or_default(&cli.config)?;
    tracing::debug!(
        "documents: {}, formulas: {}, model: {}",
        cfg.paths.documents_dir.display(),
        cfg.paths.formulas_file.display(),
        cfg.model.model_path().display()
    );
    let mut sink = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .sink();

    match cli.command {
        Commands::List => {
            let files = PdfDirectory::new(cfg.paths.documents_dir.clone()).list_documents()?;
            println!("{}", render_list(&files));
            Ok(())
        }
        Commands::Session(command) => {
            let mut session = StudySession::open(cfg)?;
            execute(&mut session, command, sink.as_mut())?;
            session.close()
        }
    }
}

fn execute(
    session: &mut StudySession,
    command: SessionCommand,
    sink: &mut dyn ProgressSink,
) -> anyhow::Result<()> {
    match command {
        SessionCommand::Ask { query } => {
            println!("{}", session.ask_formula(&query, sink)?.render());
        }
        SessionCommand::Search { question } => {
            println!("{}", session.search(&question, sink)?.render());
        }
        SessionCommand::Pdf { file, question } => {
            println!("{}", session.query_document(&file, &question, sink)?.render());
        }
        SessionCommand::Study { file, question } => {
            let summary = session.index_document(&file, sink)?;
            println!("{}", summary.completion_message());
            if let Some(question) = question {
                println!("{}", session.in_depth_query(&question, sink)?.render());
            }
        }
        SessionCommand::Summary { file } => {
            session.index_document(&file, sink)?;
            println!("{}", session.summarize_chapter(sink)?.render());
        }
        SessionCommand::Shell => {
            let stdin = std::io::stdin();
            shell::run_shell(session, stdin.lock(), std::io::stdout(), sink)?;
        }
    }
    Ok(())
}
