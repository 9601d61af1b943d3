//! Chunk retrieval over the active [`RetrievalIndex`].
//!
//! [`KeywordRetriever`] is recall-first: a chunk qualifies when any
//! whitespace-separated token of the lowercased question occurs as a
//! substring of the lowercased chunk. Qualifying chunks are returned in
//! index order, unranked, up to the limit. Short tokens such as "a" match
//! nearly everything; swap in another [`Retriever`] to change that.

use crate::models::{Chunk, RetrievalIndex};

pub trait Retriever: Send + Sync {
    /// Up to `limit` chunks relevant to `question`, in the order they should
    /// appear in a prompt.
    fn retrieve<'a>(&self, index: &'a RetrievalIndex, question: &str, limit: usize)
        -> Vec<&'a Chunk>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordRetriever;

impl Retriever for KeywordRetriever {
    fn retrieve<'a>(
        &self,
        index: &'a RetrievalIndex,
        question: &str,
        limit: usize,
    ) -> Vec<&'a Chunk> {
        let lowered = question.to_lowercase();
        let terms: Vec<&str> = lowered.split_whitespace().collect();
        if terms.is_empty() || limit == 0 {
            return Vec::new();
        }

        index
            .chunks()
            .iter()
            .filter(|chunk| {
                let text = chunk.text.to_lowercase();
                terms.iter().any(|t| text.contains(t))
            })
            .take(limit)
            .collect()
    }
}

/// Join retrieved chunk texts into a prompt context. Empty when `chunks` is.
pub fn join_context(chunks: &[&Chunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(texts: &[&str]) -> RetrievalIndex {
        RetrievalIndex::new(
            "ch.pdf",
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| Chunk::new(i, t.to_string()))
                .collect(),
        )
    }

    #[test]
    fn matches_any_token_case_insensitively() {
        let idx = index(&["Momentum is conserved", "Heat flows", "TORQUE and levers"]);
        let hits = KeywordRetriever.retrieve(&idx, "what about Torque or momentum", 5);
        let ids: Vec<&str> = hits.iter().map(|c| c.id.as_str()).collect();
        // "what"/"about"/"or" are absent everywhere; index order preserved.
        assert_eq!(ids, vec!["chunk_0", "chunk_2"]);
    }

    #[test]
    fn substring_not_whole_word() {
        let idx = index(&["thermodynamics"]);
        assert_eq!(KeywordRetriever.retrieve(&idx, "dynamic", 3).len(), 1);
    }

    #[test]
    fn limit_takes_earliest_chunks() {
        let idx = index(&["energy a", "energy b", "energy c", "energy d"]);
        let hits = KeywordRetriever.retrieve(&idx, "energy", 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[2].id, "chunk_2");
    }

    #[test]
    fn no_match_yields_empty_context() {
        let idx = index(&["optics", "waves"]);
        let hits = KeywordRetriever.retrieve(&idx, "entropy", 3);
        assert!(hits.is_empty());
        assert_eq!(join_context(&hits), "");
    }

    #[test]
    fn empty_index_or_question() {
        let empty = RetrievalIndex::default();
        assert!(KeywordRetriever.retrieve(&empty, "anything", 3).is_empty());
        let idx = index(&["optics"]);
        assert!(KeywordRetriever.retrieve(&idx, "   ", 3).is_empty());
    }

    #[test]
    fn context_joined_with_blank_lines() {
        let idx = index(&["one", "two"]);
        let hits = KeywordRetriever.retrieve(&idx, "o", 5);
        assert_eq!(join_context(&hits), "one\n\ntwo");
    }
}
