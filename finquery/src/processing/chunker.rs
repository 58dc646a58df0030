use crate::config::ProcessingConfig;
use crate::models::{ChunkMetadata, Document, DocumentChunk};

/// Boundary candidates, in priority order: paragraph break, sentence
/// terminators, plain space.
const BOUNDARY_DELIMITERS: &[&str] = &["\n\n", ". ", ".\n", "! ", "?\n", " "];

/// Window searched around the target offset for a natural boundary.
const BOUNDARY_SLACK: usize = 100;

/// Splits a page-tagged document into overlapping, boundary-aware chunks.
pub struct DocumentChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentChunker {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self::with_sizes(config.chunk_size, config.chunk_overlap)
    }

    pub fn with_sizes(chunk_size: usize, chunk_overlap: usize) -> Self {
        // An overlap reaching back past the earliest possible cut point
        // would stall the accumulator; clamp it.
        let max_overlap = chunk_size.saturating_sub(BOUNDARY_SLACK + 1);
        let chunk_overlap = if chunk_overlap > max_overlap {
            tracing::warn!(
                chunk_overlap,
                max_overlap,
                "chunk_overlap too large for chunk_size, clamping"
            );
            max_overlap
        } else {
            chunk_overlap
        };

        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Walk the page-ordered text through an accumulator, cutting a chunk
    /// whenever it reaches the target size. Each chunk after the first
    /// re-includes the last `chunk_overlap` characters of its predecessor.
    pub fn chunk_document(&self, document: &Document) -> Vec<DocumentChunk> {
        tracing::info!(file = %document.filename, "Chunking document");

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_page = 1u32;
        let mut chunk_index = 0usize;

        for (page_idx, page_text) in document.pages.iter().enumerate() {
            let page_num = page_idx as u32 + 1;
            current.push_str(page_text);
            current_page = page_num;

            while current.len() >= self.chunk_size {
                let cut = self.find_chunk_boundary(&current);
                let chunk_text = current[..cut].trim();

                if !chunk_text.is_empty() {
                    chunks.push(self.make_chunk(document, chunk_text, page_num, chunk_index));
                    chunk_index += 1;
                }

                // Next accumulator starts `overlap` characters before the cut
                let overlap_start =
                    floor_char_boundary(&current, cut.saturating_sub(self.chunk_overlap));
                current = current[overlap_start..].to_string();
            }
        }

        // Final partial accumulator becomes the last chunk regardless of size
        let remainder = current.trim();
        if !remainder.is_empty() {
            chunks.push(self.make_chunk(document, remainder, current_page, chunk_index));
        }

        tracing::info!(
            file = %document.filename,
            chunk_count = chunks.len(),
            "Created chunks"
        );
        chunks
    }

    fn make_chunk(
        &self,
        document: &Document,
        text: &str,
        page_number: u32,
        chunk_index: usize,
    ) -> DocumentChunk {
        DocumentChunk {
            text: text.to_string(),
            metadata: ChunkMetadata {
                document_name: document.filename.clone(),
                page_number,
                chunk_index,
                total_pages: document.num_pages,
            },
            chunk_id: DocumentChunk::chunk_id_for(&document.filename, chunk_index),
        }
    }

    /// Find a cut point near `chunk_size`, preferring natural boundaries
    /// within ±`BOUNDARY_SLACK` characters and falling back to an exact cut.
    fn find_chunk_boundary(&self, text: &str) -> usize {
        if text.len() <= self.chunk_size {
            return text.len();
        }

        let search_start =
            floor_char_boundary(text, self.chunk_size.saturating_sub(BOUNDARY_SLACK));
        let search_end =
            floor_char_boundary(text, (self.chunk_size + BOUNDARY_SLACK).min(text.len()));
        let window = &text[search_start..search_end];

        for delimiter in BOUNDARY_DELIMITERS {
            if let Some(idx) = window.rfind(delimiter) {
                return search_start + idx + delimiter.len();
            }
        }

        floor_char_boundary(text, self.chunk_size)
    }
}

/// Largest index `<= at` that lands on a UTF-8 character boundary.
fn floor_char_boundary(text: &str, at: usize) -> usize {
    let mut at = at.min(text.len());
    while at > 0 && !text.is_char_boundary(at) {
        at -= 1;
    }
    at
}
