//! Document chunking: overlapping fixed-size slices with paragraph/line/word preference.

pub mod recursive;

pub use recursive::RecursiveSplitter;

use crate::models::{Chunk, Document};

/// Split every document into chunks that inherit its source and topic.
pub fn chunk_documents(docs: &[Document], splitter: &RecursiveSplitter) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for doc in docs {
        let pieces = splitter.split_text(&doc.content);
        if pieces.is_empty() {
            tracing::warn!("No chunks generated for {}", doc.source);
            continue;
        }

        chunks.extend(pieces.into_iter().enumerate().map(|(i, content)| Chunk {
            source: doc.source.clone(),
            chunk_index: i,
            content,
            topic: doc.topic.clone(),
        }));
    }

    chunks
}
