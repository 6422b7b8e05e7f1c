//! Builds grounded context for insights generation from the retrieval
//! index, grounded on the teacher's RAG context builder.

use crate::error::Result;
use crate::retrieval::{Embedder, SearchHit, SearchParams, VectorIndex};
use std::collections::HashSet;
use std::sync::Arc;

pub struct ContextBuilder {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    max_chunks: usize,
    min_score: f32,
}

impl ContextBuilder {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index,
            embedder,
            max_chunks: 10,
            min_score: 0.3,
        }
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Build context for `query`, optionally restricted to a set of source
    /// filenames (used by cross-document insights to scope each document's
    /// contribution independently).
    pub async fn build(&self, query: &str, only_filenames: Option<&HashSet<String>>) -> Result<Vec<SearchHit>> {
        let embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| crate::error::CoreError::EmbedderUnavailable("no embedding returned".to_string()))?;

        let fetch_k = match only_filenames {
            Some(_) => self.max_chunks * 5,
            None => self.max_chunks,
        };

        let hits = self
            .index
            .search(
                &query_vector,
                &SearchParams {
                    k: fetch_k,
                    fetch_k: Some(fetch_k),
                    min_score: Some(self.min_score),
                    exclude: HashSet::new(),
                },
            )
            .await?;

        let mut filtered: Vec<SearchHit> = match only_filenames {
            Some(names) => hits.into_iter().filter(|h| names.contains(&h.chunk.filename)).collect(),
            None => hits,
        };
        filtered.truncate(self.max_chunks);
        Ok(filtered)
    }
}

/// Format search hits as citation-bearing excerpts for an LLM prompt.
pub fn format_hits_for_prompt(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| format!("[{} p.{}] {}", h.chunk.filename, h.chunk.page_number, h.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}
