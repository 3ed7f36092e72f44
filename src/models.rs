use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A source document loaded from the corpus directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Path relative to the corpus root, `/`-separated. Used as the citation id.
    pub source: String,
    pub content: String,
    pub topic: Option<String>,
}

/// A single indexed chunk of a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
    pub topic: Option<String>,
}

/// A fused retrieval result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub source: String,
    pub chunk_index: usize,
    pub content: String,
    pub topic: Option<String>,
    pub bm25_score: f32,
    pub vector_score: f32,
    pub combined_score: f32,
}

/// Model output split into prose and cited sources
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

/// One message of a chat-completion request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Form body posted to `/`
#[derive(Debug, Clone, Deserialize)]
pub struct AskForm {
    #[serde(default)]
    pub question: String,
}

/// Summary written next to the index by the build job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub built_at: DateTime<Utc>,
    pub document_count: usize,
    pub chunk_count: usize,
    pub embedding_model: String,
    /// Chunk count per topic tag; untagged chunks are counted under "untagged"
    pub topics: BTreeMap<String, usize>,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub vector_entries: usize,
    pub bm25_docs: u64,
    pub built_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_form_missing_question_defaults_empty() {
        let form: AskForm = serde_json::from_str("{}").unwrap();
        assert!(form.question.is_empty());
    }

    #[test]
    fn test_untagged_chunk_serializes_null_topic() {
        let chunk = Chunk {
            source: "intro.md".into(),
            chunk_index: 0,
            content: "text".into(),
            topic: None,
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json["topic"].is_null());
    }
}
