//! Retrieval pipeline: PDF ingestion (C1), embedding (C2) and the
//! in-memory nearest-neighbor index (C3).

mod chunk;
mod embedding;
mod ingest;
mod index;

pub use chunk::{sanitize_filename, Chunk};
pub use embedding::{cosine_similarity, normalize, Embedder, OpenAiEmbedder, Vector};
pub use ingest::{Ingestor, PdfIngestor};
pub use index::{IndexEntry, SearchHit, SearchParams, VectorIndex};
