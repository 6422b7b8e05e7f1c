//! C3: VectorIndex — in-memory nearest-neighbor search over `Chunk`s.
//!
//! Grounded on the teacher's in-memory vector store: a `RwLock`-guarded
//! `Vec` scanned linearly, generalized with fetch_k over-fetching, page-level
//! dedup, a minimum-score floor and an exclude predicate.

use crate::error::{CoreError, Result};
use crate::retrieval::chunk::Chunk;
use crate::retrieval::embedding::{cosine_similarity, Vector};
use std::collections::HashSet;
use tokio::sync::RwLock;

/// One entry in the index: a chunk plus its embedding vector.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vector,
}

/// A single scored search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Search parameters. `fetch_k` defaults to `k * fetch_k_multiplier` when
/// unset; `min_score` filters out weak matches before dedup; `exclude`
/// removes chunks whose `(filename, page_number)` is already known to the
/// caller (e.g. already cited in a running insights session).
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub k: usize,
    pub fetch_k: Option<usize>,
    pub min_score: Option<f32>,
    pub exclude: HashSet<(String, u32)>,
}

/// In-memory nearest-neighbor index over embedded chunks.
///
/// Non-goal: no persistent or distributed storage. The entire index lives
/// in process memory and is rebuilt from `document_library/` on restart by
/// re-ingesting and re-embedding.
pub struct VectorIndex {
    dimensions: u32,
    fetch_k_multiplier: usize,
    entries: RwLock<Vec<IndexEntry>>,
}

impl VectorIndex {
    pub fn new(dimensions: u32, fetch_k_multiplier: usize) -> Self {
        Self {
            dimensions,
            fetch_k_multiplier,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn dimensions(&self) -> u32 {
        self.dimensions
    }

    /// Add chunks with their matching vectors. `chunks` and `vectors` must
    /// have equal length and every vector must match the index dimension.
    pub async fn add(&self, chunks: Vec<Chunk>, vectors: Vec<Vector>) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(CoreError::InvalidRequest(format!(
                "chunk count {} does not match vector count {}",
                chunks.len(),
                vectors.len()
            )));
        }
        for v in &vectors {
            if v.len() as u32 != self.dimensions {
                return Err(CoreError::DimensionMismatch {
                    expected: self.dimensions as usize,
                    got: v.len(),
                });
            }
        }

        let mut guard = self.entries.write().await;
        for (chunk, vector) in chunks.into_iter().zip(vectors.into_iter()) {
            guard.push(IndexEntry { chunk, vector });
        }
        Ok(())
    }

    /// Remove all entries for a given filename (used when a document is
    /// re-ingested or deleted from the library).
    pub async fn remove_document(&self, filename: &str) {
        let mut guard = self.entries.write().await;
        guard.retain(|e| e.chunk.filename != filename);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// All chunks belonging to `filename`, in document reading order. Used
    /// to drive full-document script synthesis rather than similarity
    /// search.
    pub async fn chunks_for_document(&self, filename: &str) -> Vec<Chunk> {
        let guard = self.entries.read().await;
        let mut chunks: Vec<Chunk> = guard
            .iter()
            .filter(|e| e.chunk.filename == filename)
            .map(|e| e.chunk.clone())
            .collect();
        chunks.sort_by_key(|c| (c.page_number, c.section_index));
        chunks
    }

    /// The embedding vector already stored for a specific indexed page,
    /// reused as a search query so "more like this page" doesn't need to
    /// re-embed anything.
    pub async fn vector_for_page(&self, filename: &str, page_number: u32) -> Option<Vector> {
        let guard = self.entries.read().await;
        guard
            .iter()
            .find(|e| e.chunk.filename == filename && e.chunk.page_number == page_number)
            .map(|e| e.vector.clone())
    }

    /// The distinct filenames currently indexed, in first-seen order.
    pub async fn document_filenames(&self) -> Vec<String> {
        let guard = self.entries.read().await;
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for e in guard.iter() {
            if seen.insert(e.chunk.filename.clone()) {
                names.push(e.chunk.filename.clone());
            }
        }
        names
    }

    /// Search for the `k` nearest chunks to `query`, applying page-level
    /// dedup (at most one hit per `(filename, page_number)`) and insertion
    /// order as a deterministic tie-break for equal scores.
    pub async fn search(&self, query: &Vector, params: &SearchParams) -> Result<Vec<SearchHit>> {
        if query.len() as u32 != self.dimensions {
            return Err(CoreError::DimensionMismatch {
                expected: self.dimensions as usize,
                got: query.len(),
            });
        }
        if params.k == 0 {
            return Ok(Vec::new());
        }

        let fetch_k = params
            .fetch_k
            .unwrap_or_else(|| params.k * self.fetch_k_multiplier.max(1));

        let guard = self.entries.read().await;

        let mut scored: Vec<(usize, f32)> = guard
            .iter()
            .enumerate()
            .filter(|(_, e)| !params.exclude.contains(&e.chunk.page_key()))
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .filter(|(_, score)| params.min_score.is_none_or(|min| *score >= min))
            .collect();

        // Stable sort: ties keep insertion order, matching the document's
        // first-seen order in `document_library/`.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(fetch_k);

        let mut seen_pages: HashSet<(String, u32)> = HashSet::new();
        let mut hits = Vec::with_capacity(params.k);
        for (idx, score) in scored {
            let chunk = &guard[idx].chunk;
            let key = chunk.page_key();
            if !seen_pages.insert(key) {
                continue;
            }
            hits.push(SearchHit {
                chunk: chunk.clone(),
                score,
            });
            if hits.len() == params.k {
                break;
            }
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(filename: &str, page: u32, section: u32) -> Chunk {
        Chunk::new(
            format!("text for {filename} p{page} s{section}"),
            filename.to_string(),
            page,
            section,
            None,
        )
    }

    #[tokio::test]
    async fn test_search_ranks_by_score() {
        let idx = VectorIndex::new(2, 3);
        idx.add(
            vec![chunk("a.pdf", 1, 0), chunk("a.pdf", 2, 0)],
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
        )
        .await
        .unwrap();

        let hits = idx
            .search(
                &vec![1.0, 0.0],
                &SearchParams {
                    k: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.page_number, 1);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_search_dedups_by_page() {
        let idx = VectorIndex::new(2, 10);
        idx.add(
            vec![chunk("a.pdf", 1, 0), chunk("a.pdf", 1, 1)],
            vec![vec![1.0, 0.0], vec![0.9, 0.1]],
        )
        .await
        .unwrap();

        let hits = idx
            .search(
                &vec![1.0, 0.0],
                &SearchParams {
                    k: 5,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_search_respects_exclude() {
        let idx = VectorIndex::new(2, 10);
        idx.add(vec![chunk("a.pdf", 1, 0)], vec![vec![1.0, 0.0]])
            .await
            .unwrap();

        let mut exclude = HashSet::new();
        exclude.insert(("a.pdf".to_string(), 1));

        let hits = idx
            .search(
                &vec![1.0, 0.0],
                &SearchParams {
                    k: 5,
                    exclude,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let idx = VectorIndex::new(3, 3);
        let err = idx
            .add(vec![chunk("a.pdf", 1, 0)], vec![vec![1.0, 0.0]])
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_remove_document() {
        let idx = VectorIndex::new(2, 3);
        idx.add(vec![chunk("a.pdf", 1, 0)], vec![vec![1.0, 0.0]])
            .await
            .unwrap();
        idx.remove_document("a.pdf").await;
        assert!(idx.is_empty().await);
    }

    #[tokio::test]
    async fn test_chunks_for_document_ordered_by_reading_position() {
        let idx = VectorIndex::new(2, 3);
        idx.add(
            vec![chunk("a.pdf", 2, 0), chunk("a.pdf", 1, 1), chunk("a.pdf", 1, 0)],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .await
        .unwrap();

        let ordered = idx.chunks_for_document("a.pdf").await;
        assert_eq!(
            ordered.iter().map(|c| (c.page_number, c.section_index)).collect::<Vec<_>>(),
            vec![(1, 0), (1, 1), (2, 0)]
        );
    }

    #[tokio::test]
    async fn test_vector_for_page_reuses_stored_embedding() {
        let idx = VectorIndex::new(2, 3);
        idx.add(vec![chunk("a.pdf", 1, 0)], vec![vec![0.6, 0.8]]).await.unwrap();

        assert_eq!(idx.vector_for_page("a.pdf", 1).await, Some(vec![0.6, 0.8]));
        assert_eq!(idx.vector_for_page("a.pdf", 2).await, None);
    }

    #[tokio::test]
    async fn test_document_filenames_first_seen_order() {
        let idx = VectorIndex::new(2, 3);
        idx.add(
            vec![chunk("b.pdf", 1, 0), chunk("a.pdf", 1, 0), chunk("b.pdf", 2, 0)],
            vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .await
        .unwrap();

        assert_eq!(idx.document_filenames().await, vec!["b.pdf".to_string(), "a.pdf".to_string()]);
    }
}
