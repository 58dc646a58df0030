mod chunker;
mod extractor;

pub use chunker::DocumentChunker;
pub use extractor::{load_document, process_document};
