//! C1: Ingestor — turns a PDF file into ordered `Chunk`s.

use crate::config::IngestSettings;
use crate::error::{CoreError, Result};
use crate::retrieval::chunk::{sanitize_filename, Chunk};
use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

/// Converts a source document into an ordered sequence of `Chunk`s.
#[async_trait]
pub trait Ingestor: Send + Sync {
    async fn ingest(&self, path: &Path) -> Result<Vec<Chunk>>;
}

/// Splits page text into target-token chunks with overlap, grounded on the
/// token-budget chunking approach used for transcript chunking, generalized
/// to page-scoped PDF text instead of timestamped transcript segments.
pub struct PdfIngestor {
    settings: IngestSettings,
}

impl PdfIngestor {
    pub fn new(settings: IngestSettings) -> Self {
        Self { settings }
    }

    fn validate_extension(&self, path: &Path) -> Result<()> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| CoreError::InvalidDocument("file has no extension".to_string()))?;
        if !self.settings.allowed_extensions.iter().any(|a| a == &ext) {
            return Err(CoreError::InvalidDocument(format!(
                "extension '{ext}' is not allowed"
            )));
        }
        Ok(())
    }

    fn validate_size(&self, path: &Path) -> Result<()> {
        let meta = std::fs::metadata(path)?;
        if meta.len() > self.settings.max_file_size {
            return Err(CoreError::InvalidDocument(format!(
                "file size {} exceeds maximum {}",
                meta.len(),
                self.settings.max_file_size
            )));
        }
        Ok(())
    }

    /// Split one page's raw text into chunks of roughly `target_tokens`,
    /// each overlapping the previous by `overlap_tokens` words, capped at
    /// `max_chunk_chars`. Approximates tokens as whitespace-delimited words.
    /// Prefers ending a chunk on a sentence boundary within 20% of the
    /// target size over a hard word-count cut.
    fn split_page(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let target = self.settings.target_tokens.max(1);
        let overlap = self.settings.overlap_tokens.min(target.saturating_sub(1));
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < words.len() {
            let ideal_end = (start + target).min(words.len());
            let end = if ideal_end == words.len() {
                ideal_end
            } else {
                find_sentence_boundary(&words, start, ideal_end).unwrap_or(ideal_end)
            };

            let mut piece = words[start..end].join(" ");
            if piece.chars().count() > self.settings.max_chunk_chars {
                piece = piece.chars().take(self.settings.max_chunk_chars).collect();
            }
            chunks.push(piece);
            if end == words.len() {
                break;
            }
            start = end.saturating_sub(overlap).max(start + 1);
        }
        chunks
    }
}

#[async_trait]
impl Ingestor for PdfIngestor {
    async fn ingest(&self, path: &Path) -> Result<Vec<Chunk>> {
        self.validate_extension(path)?;
        self.validate_size(path)?;

        let filename = sanitize_filename(path);
        let path_owned = path.to_path_buf();

        let extraction = tokio::task::spawn_blocking(move || extract_pages(&path_owned))
            .await
            .map_err(|e| CoreError::InvalidDocument(format!("extraction task panicked: {e}")))??;

        if extraction.pages.iter().all(|p| p.trim().is_empty()) {
            return Err(CoreError::EmptyExtraction(filename));
        }

        let page_count = extraction.pages.len();
        let mut blocks: Option<Vec<String>> = None;
        let mut out = Vec::new();

        for (page_idx, page_text) in extraction.pages.iter().enumerate() {
            let page_number = (page_idx + 1) as u32;
            let mut text = page_text.clone();

            if text.trim().is_empty() {
                let recovered = blocks
                    .get_or_insert_with(|| extract_blocks(&extraction.raw_bytes).unwrap_or_default())
                    .as_slice();
                match block_for_page(recovered, page_idx, page_count) {
                    Some(recovered_text) => text = recovered_text,
                    None => {
                        warn!(page_number, "page produced no extractable text even after block-level retry, skipping");
                        continue;
                    }
                }
            }

            if text.trim().is_empty() {
                continue;
            }

            let title = Chunk::derive_title(&text);
            for (section_index, piece) in self.split_page(&text).into_iter().enumerate() {
                if piece.trim().is_empty() {
                    continue;
                }
                out.push(Chunk::new(
                    piece,
                    filename.clone(),
                    page_number,
                    section_index as u32,
                    title.clone(),
                ));
            }
        }

        if out.is_empty() {
            return Err(CoreError::EmptyExtraction(filename));
        }

        Ok(out)
    }
}

/// Result of extracting a PDF's per-page text, bundled with the raw file
/// bytes so a failed page can be retried with whole-document extraction
/// without re-reading the file.
struct PageExtraction {
    pages: Vec<String>,
    raw_bytes: Vec<u8>,
}

/// Extract per-page text from a PDF file. Runs on a blocking thread: the
/// underlying extraction crate is synchronous.
fn extract_pages(path: &Path) -> Result<PageExtraction> {
    let raw_bytes = std::fs::read(path)?;
    let pages = pdf_extract::extract_text_by_pages(&raw_bytes)
        .map_err(|e| CoreError::InvalidDocument(format!("PDF extraction failed: {e}")))?;
    Ok(PageExtraction { pages, raw_bytes })
}

/// Fallback for pages the per-page extractor returned empty: re-extracts
/// the whole document as one text blob and splits it into blank-line
/// delimited blocks, approximating block-level extraction.
fn extract_blocks(raw_bytes: &[u8]) -> Option<Vec<String>> {
    let whole = pdf_extract::extract_text_from_mem(raw_bytes).ok()?;
    let blocks: Vec<String> = whole
        .split("\n\n")
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();
    if blocks.is_empty() {
        None
    } else {
        Some(blocks)
    }
}

/// Map an empty page index onto the proportionally corresponding block,
/// a heuristic recovery when per-page extraction returned nothing for it.
fn block_for_page(blocks: &[String], page_idx: usize, page_count: usize) -> Option<String> {
    if blocks.is_empty() || page_count == 0 {
        return None;
    }
    let ratio = page_idx as f64 / page_count as f64;
    let block_idx = ((ratio * blocks.len() as f64) as usize).min(blocks.len() - 1);
    let text = &blocks[block_idx];
    if text.trim().is_empty() {
        None
    } else {
        Some(text.clone())
    }
}

/// Search for a word index ending a sentence within 20% of `ideal_end`,
/// preferring the boundary closest to it. `None` if no sentence-ending
/// word falls in that window.
fn find_sentence_boundary(words: &[&str], start: usize, ideal_end: usize) -> Option<usize> {
    let span = ideal_end.saturating_sub(start).max(1);
    let window = ((span as f64) * 0.2).round() as usize;
    let low = ideal_end.saturating_sub(window).max(start + 1);
    let high = (ideal_end + window).min(words.len());

    (low..=high)
        .filter(|&i| i > start && i <= words.len() && ends_sentence(words[i - 1]))
        .min_by_key(|&i| (i as i64 - ideal_end as i64).abs())
}

fn ends_sentence(word: &str) -> bool {
    let trimmed = word.trim_end_matches(['"', '\'', ')', ']', '”', '’']);
    trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor() -> PdfIngestor {
        PdfIngestor::new(IngestSettings {
            max_file_size: 50 * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string()],
            target_tokens: 5,
            overlap_tokens: 2,
            max_chunk_chars: 4000,
        })
    }

    #[test]
    fn test_split_page_overlaps() {
        let ing = ingestor();
        let text = "one two three four five six seven eight nine ten";
        let chunks = ing.split_page(text);
        assert!(chunks.len() > 1);
        // First chunk has target_tokens words, second overlaps by overlap_tokens.
        assert_eq!(chunks[0], "one two three four five");
        assert!(chunks[1].starts_with("four five"));
    }

    #[test]
    fn test_split_page_empty() {
        let ing = ingestor();
        assert!(ing.split_page("   ").is_empty());
    }

    #[test]
    fn test_validate_extension_rejects_non_pdf() {
        let ing = ingestor();
        let err = ing.validate_extension(Path::new("notes.txt"));
        assert!(err.is_err());
    }

    #[test]
    fn test_split_page_caps_at_max_chars() {
        let ing = PdfIngestor::new(IngestSettings {
            max_file_size: 50 * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string()],
            target_tokens: 100,
            overlap_tokens: 0,
            max_chunk_chars: 10,
        });
        let text = "aaaaaaaaaa bbbbbbbbbb";
        let chunks = ing.split_page(text);
        assert!(chunks[0].chars().count() <= 10);
    }

    #[test]
    fn test_split_page_prefers_sentence_boundary() {
        let ing = PdfIngestor::new(IngestSettings {
            max_file_size: 50 * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string()],
            target_tokens: 6,
            overlap_tokens: 0,
            max_chunk_chars: 4000,
        });
        // Sentence ends at word 5 ("cat."), one word short of the target of 6.
        // That's within the 20% window, so the split should land there
        // instead of at the hard word-count cut.
        let text = "the quick brown fox sat. then it ran away fast";
        let chunks = ing.split_page(text);
        assert_eq!(chunks[0], "the quick brown fox sat.");
    }

    #[test]
    fn test_block_for_page_maps_proportionally() {
        let blocks = vec!["first block".to_string(), "second block".to_string()];
        assert_eq!(block_for_page(&blocks, 0, 4).as_deref(), Some("first block"));
        assert_eq!(block_for_page(&blocks, 3, 4).as_deref(), Some("second block"));
    }
}
