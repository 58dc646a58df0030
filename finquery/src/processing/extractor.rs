use std::path::Path;

use crate::config::ProcessingConfig;
use crate::error::{FinqueryError, Result};
use crate::models::{Document, DocumentChunk, DocumentMetadata};

use super::DocumentChunker;

/// Load and parse a PDF into a page-tagged [`Document`].
pub fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(FinqueryError::NotFound(format!(
            "PDF file not found: {}",
            path.display()
        )));
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    tracing::info!(file = %filename, "Loading PDF");

    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| FinqueryError::Pdf(format!("Failed to parse PDF {filename}: {e}")))?;
    let num_pages = pages.len() as u32;

    let file_size = path.metadata().map(|m| m.len()).unwrap_or(0);
    let (title, author) = pdf_info(path);

    let total_chars: usize = pages.iter().map(String::len).sum();
    tracing::info!(
        file = %filename,
        num_pages,
        total_chars,
        "Successfully loaded PDF"
    );

    Ok(Document {
        metadata: DocumentMetadata {
            filename: filename.clone(),
            num_pages,
            file_size,
            title,
            author,
        },
        filename,
        pages,
        num_pages,
    })
}

/// Complete ingestion-side pipeline: load a PDF and chunk it.
pub fn process_document(path: &Path, config: &ProcessingConfig) -> Result<Vec<DocumentChunk>> {
    let document = load_document(path)?;
    let chunker = DocumentChunker::new(config);
    Ok(chunker.chunk_document(&document))
}

/// Best-effort title/author from the PDF Info dictionary.
fn pdf_info(path: &Path) -> (Option<String>, Option<String>) {
    let Ok(doc) = lopdf::Document::load(path) else {
        return (None, None);
    };

    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| match obj {
            lopdf::Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|obj| obj.as_dict().ok());

    let Some(info) = info else {
        return (None, None);
    };

    let read_field = |key: &[u8]| {
        info.get(key)
            .ok()
            .and_then(|obj| obj.as_str().ok())
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|s| !s.is_empty())
    };

    (read_field(b"Title"), read_field(b"Author"))
}
