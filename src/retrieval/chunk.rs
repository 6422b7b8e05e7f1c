//! The `Chunk` data type: one extracted text fragment.

use serde::{Deserialize, Serialize};

/// One extracted text fragment from a PDF page.
///
/// Invariants: chunks from the same `(filename, page_number)` have
/// strictly ascending `section_index`; `text` is never empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub filename: String,
    pub page_number: u32,
    pub section_index: u32,
    pub section_title: Option<String>,
}

impl Chunk {
    pub fn new(
        text: String,
        filename: String,
        page_number: u32,
        section_index: u32,
        section_title: Option<String>,
    ) -> Self {
        Self {
            text,
            filename,
            page_number,
            section_index,
            section_title,
        }
    }

    /// The `(filename, page_number)` pair used for dedup and exclude predicates.
    pub fn page_key(&self) -> (String, u32) {
        (self.filename.clone(), self.page_number)
    }

    /// Derive a short section title heuristically from the first line of text.
    pub fn derive_title(text: &str) -> Option<String> {
        let first_line = text.lines().next()?.trim();
        if first_line.is_empty() || first_line.len() > 80 {
            return None;
        }
        // Heuristic: a short, capitalized first line that doesn't end in a
        // mid-sentence comma is likely a heading.
        let starts_capital = first_line.chars().next().is_some_and(|c| c.is_uppercase());
        if starts_capital && !first_line.ends_with(',') {
            Some(first_line.to_string())
        } else {
            None
        }
    }
}

/// Sanitize an arbitrary filesystem path down to a stable, leaf filename
/// identifier safe to use as a `document_library/` key.
pub fn sanitize_filename(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_title_heading() {
        assert_eq!(
            Chunk::derive_title("Introduction\nThe rest of the content follows."),
            Some("Introduction".to_string())
        );
    }

    #[test]
    fn test_derive_title_rejects_long_or_lowercase() {
        assert_eq!(Chunk::derive_title("this starts lowercase, so no title"), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename(std::path::Path::new("/tmp/../My Paper (v2).pdf")),
            "My_Paper__v2_.pdf"
        );
    }
}
