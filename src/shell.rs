//! Interactive line-oriented shell over a [`StudySession`].
//!
//! Commands are matched case-insensitively on their keyword; arguments keep
//! their original case. Errors from an operation are printed as `❌ ...`
//! lines and the loop continues.

use anyhow::Result;
use std::io::{BufRead, Write};

use crate::error::{classify, StudyError};
use crate::progress::ProgressSink;
use crate::session::StudySession;

pub const BANNER: &str = "🔍 AI Study Bot - Type 'help' for commands";

pub const HELP: &str = "\nCommands:
ask <question> - Get a formula
search <question> - General knowledge search
pdf <filename> <question> - Query a PDF
list - Show available PDFs
index <filename> - Study PDF in-depth
query <question> - Ask detailed question after indexing
summary - Summarize the chapter
exit - Quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Ask(String),
    Search(String),
    Pdf { filename: String, question: String },
    List,
    Index(String),
    Query(String),
    Summary,
    Help,
    Exit,
    /// Recognised keyword with missing arguments; carries the usage line.
    Usage(&'static str),
    Empty,
    Invalid,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ShellCommand::Empty;
        }

        let (keyword, rest) = match line.split_once(char::is_whitespace) {
            Some((k, r)) => (k, r.trim()),
            None => (line, ""),
        };

        match keyword.to_lowercase().as_str() {
            "exit" | "quit" if rest.is_empty() => ShellCommand::Exit,
            "help" if rest.is_empty() => ShellCommand::Help,
            "list" if rest.is_empty() => ShellCommand::List,
            "summary" if rest.is_empty() => ShellCommand::Summary,
            "pdf" => match rest.split_once(char::is_whitespace) {
                Some((filename, question)) if !question.trim().is_empty() => ShellCommand::Pdf {
                    filename: filename.to_string(),
                    question: question.trim().to_string(),
                },
                _ => ShellCommand::Usage("Usage: pdf filename.pdf 'your question'"),
            },
            "index" if rest.is_empty() => ShellCommand::Usage("Usage: index filename.pdf"),
            "index" => ShellCommand::Index(rest.to_string()),
            "ask" if !rest.is_empty() => ShellCommand::Ask(rest.to_string()),
            "query" if !rest.is_empty() => ShellCommand::Query(rest.to_string()),
            "search" if !rest.is_empty() => ShellCommand::Search(rest.to_string()),
            _ => ShellCommand::Invalid,
        }
    }
}

/// Run the read-eval-print loop until `exit`, `quit` or end of input.
pub fn run_shell<R: BufRead, W: Write>(
    session: &mut StudySession,
    input: R,
    mut output: W,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    writeln!(output, "{}", BANNER)?;
    let mut lines = input.lines();

    loop {
        write!(output, "\nYou: ")?;
        output.flush()?;

        let Some(line) = lines.next() else {
            writeln!(output)?;
            break;
        };
        let command = ShellCommand::parse(&line?);
        if command == ShellCommand::Exit {
            break;
        }
        dispatch(session, command, &mut output, sink)?;
    }
    Ok(())
}

fn dispatch<W: Write>(
    session: &mut StudySession,
    command: ShellCommand,
    output: &mut W,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    let rendered: Result<String> = match command {
        ShellCommand::Empty => {
            Ok("❌ Please enter a command. Type 'help' for available commands.".to_string())
        }
        ShellCommand::Invalid => {
            Ok("❌ Invalid command. Type 'help' for available commands.".to_string())
        }
        ShellCommand::Usage(usage) => Ok(usage.to_string()),
        ShellCommand::Help => Ok(HELP.to_string()),
        ShellCommand::Exit => Ok(String::new()),
        ShellCommand::List => session.list_documents().map(|files| render_list(&files)),
        ShellCommand::Ask(query) => session.ask_formula(&query, sink).map(|a| a.render()),
        ShellCommand::Search(question) => session.search(&question, sink).map(|a| a.render()),
        ShellCommand::Pdf { filename, question } => session
            .query_document(&filename, &question, sink)
            .map(|a| a.render()),
        ShellCommand::Index(filename) => session
            .index_document(&filename, sink)
            .map(|s| s.completion_message()),
        ShellCommand::Query(question) => {
            if session.retrieval_index().is_empty() {
                Ok("❌ Please index a PDF chapter first using 'index filename.pdf'".to_string())
            } else {
                session.in_depth_query(&question, sink).map(|a| a.render())
            }
        }
        ShellCommand::Summary => session.summarize_chapter(sink).map(|a| a.render()),
    };

    match rendered {
        Ok(text) => writeln!(output, "{}", text)?,
        Err(e) => writeln!(output, "{}", error_line(&e))?,
    }
    Ok(())
}

pub fn render_list(files: &[String]) -> String {
    if files.is_empty() {
        return "\nNo PDFs found".to_string();
    }
    let mut out = String::from("\nAvailable PDFs:");
    for f in files {
        out.push_str("\n- ");
        out.push_str(f);
    }
    out
}

/// One-line user-facing rendering of an operation error.
pub fn error_line(err: &anyhow::Error) -> String {
    match classify(err) {
        Some(StudyError::InvalidInput(msg)) => format!("❌ {}", msg),
        Some(StudyError::EmptyDocument(_)) => {
            "❌ The document is empty or unreadable.".to_string()
        }
        _ => format!("❌ Error: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_case_insensitively() {
        assert_eq!(ShellCommand::parse("  EXIT "), ShellCommand::Exit);
        assert_eq!(ShellCommand::parse("quit"), ShellCommand::Exit);
        assert_eq!(ShellCommand::parse("Help"), ShellCommand::Help);
        assert_eq!(
            ShellCommand::parse("Ask Kinetic Energy"),
            ShellCommand::Ask("Kinetic Energy".into())
        );
        assert_eq!(ShellCommand::parse("summary"), ShellCommand::Summary);
    }

    #[test]
    fn pdf_splits_filename_from_question() {
        assert_eq!(
            ShellCommand::parse("pdf ch1.pdf what is  torque?"),
            ShellCommand::Pdf {
                filename: "ch1.pdf".into(),
                question: "what is  torque?".into(),
            }
        );
    }

    #[test]
    fn missing_arguments_yield_usage() {
        assert_eq!(
            ShellCommand::parse("pdf ch1.pdf"),
            ShellCommand::Usage("Usage: pdf filename.pdf 'your question'")
        );
        assert_eq!(
            ShellCommand::parse("index"),
            ShellCommand::Usage("Usage: index filename.pdf")
        );
    }

    #[test]
    fn empty_and_unknown_lines() {
        assert_eq!(ShellCommand::parse("   "), ShellCommand::Empty);
        assert_eq!(ShellCommand::parse("dance"), ShellCommand::Invalid);
        assert_eq!(ShellCommand::parse("ask"), ShellCommand::Invalid);
        assert_eq!(ShellCommand::parse("list everything"), ShellCommand::Invalid);
    }

    #[test]
    fn list_rendering() {
        assert_eq!(render_list(&[]), "\nNo PDFs found");
        assert_eq!(
            render_list(&["a.pdf".into(), "b.pdf".into()]),
            "\nAvailable PDFs:\n- a.pdf\n- b.pdf"
        );
    }

    #[test]
    fn error_lines_by_class() {
        let invalid: anyhow::Error = StudyError::invalid("No PDF selected.").into();
        assert_eq!(error_line(&invalid), "❌ No PDF selected.");

        let missing: anyhow::Error = StudyError::NotFound("x.pdf".into()).into();
        assert_eq!(error_line(&missing), "❌ Error: File not found: x.pdf");
    }
}
