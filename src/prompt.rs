//! Prompt templates, one per task.
//!
//! Pure functions: same inputs, same prompt. Context budgets are counted in
//! characters and applied by truncation.

/// Characters of document text fed to a direct document question.
pub const DOCUMENT_QA_CHAR_BUDGET: usize = 10_000;

/// Characters of indexed chapter text fed to a summary.
pub const SUMMARY_CHAR_BUDGET: usize = 8_000;

/// Task kinds, for logging and status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    DocumentQa,
    ChapterQa,
    InDepthQa,
    Summary,
    OpenSearch,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::DocumentQa => "document-qa",
            TaskKind::ChapterQa => "chapter-qa",
            TaskKind::InDepthQa => "in-depth-qa",
            TaskKind::Summary => "summary",
            TaskKind::OpenSearch => "open-search",
        }
    }
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

pub fn formula(query: &str) -> String {
    format!(
        r#"
Provide a structured response for {query} using this exact format:

### Formula
Plain text: [Write the formula using simple characters like ^, *, /, sqrt()]
LaTeX: [Write the formula using LaTeX notation between $$ symbols]

### Definition
[Brief definition in 1-2 sentences]

### Components
- [variable]: [meaning] [unit if applicable]

### Example
Given: [input values]
Step 1: [show substitution with plain text formula]
Step 2: [show calculation]
Result: [final answer with unit]

### Notes
- [key point 1]
- [key point 2]
"#
    )
}

pub fn document_qa(document_text: &str, question: &str, max_chars: usize) -> String {
    format!(
        "Answer based on this document:\n{}\n\nQuestion: {}\nAnswer:",
        truncate_chars(document_text, max_chars),
        question
    )
}

pub fn chapter_qa(context: &str, question: &str) -> String {
    format!(
        r#"
Answer the question using the following textbook content:

{context}

Question: {question}
Answer:
"#
    )
}

pub fn in_depth_qa(context: &str, question: &str) -> String {
    format!(
        r#"
Provide a detailed answer using this textbook content:

{context}

Question: {question}
Please structure your answer with:
- Main explanation
- Key concepts involved
- Examples if applicable
- Related topics or connections

Answer:
"#
    )
}

pub fn summary(chapter_text: &str, max_chars: usize) -> String {
    format!(
        r#"
Summarize this chapter in bullet points. Include:
- Key laws and concepts
- Important formulas (in simple plain text)
- Key figures or diagrams if mentioned
- Applications or implications if explained

{}
"#,
        truncate_chars(chapter_text, max_chars)
    )
}

pub fn open_search(question: &str) -> String {
    format!(
        r#"
Provide a detailed answer to this question:

Question: {question}

Please structure your response with:
- Main explanation
- Key points and concepts
- Examples or applications
- Related topics
- Additional resources (if relevant)

Answer:
"#
    )
}
