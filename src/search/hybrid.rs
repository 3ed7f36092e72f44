use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::config::{LlmConfig, RetrievalConfig};
use crate::models::{Chunk, SearchHit};
use crate::search::bm25::{Bm25Hit, Bm25Index};
use crate::search::vector::{VectorHit, VectorStore};

/// RRF constant
pub const RRF_K: f32 = 60.0;
pub const VECTOR_WEIGHT: f32 = 0.6;
pub const LEXICAL_WEIGHT: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Vector,
    Lexical,
}

/// One ranked result list and the weight it carries in the fusion.
pub struct RankedList {
    pub method: Method,
    pub weight: f32,
    /// Chunks in rank order with the method's raw score
    pub hits: Vec<(Chunk, f32)>,
}

impl RankedList {
    pub fn vector(hits: Vec<VectorHit>, weight: f32) -> Self {
        Self {
            method: Method::Vector,
            weight,
            hits: hits.into_iter().map(|h| (h.chunk, h.score)).collect(),
        }
    }

    pub fn lexical(hits: Vec<Bm25Hit>, weight: f32) -> Self {
        Self {
            method: Method::Lexical,
            weight,
            hits: hits.into_iter().map(|h| (h.chunk, h.score)).collect(),
        }
    }
}

/// Weighted Reciprocal Rank Fusion.
///
/// A chunk at 1-based rank `r` in a list contributes `weight / (RRF_K + r)`.
/// Chunks are keyed by `(source, chunk_index)`; raw per-method scores keep
/// their max. Ties keep first-seen order.
pub fn weighted_rrf_fusion(lists: &[RankedList], limit: usize) -> Vec<SearchHit> {
    type Key = (String, usize);
    let mut order: Vec<Key> = Vec::new();
    let mut score_map: HashMap<Key, SearchHit> = HashMap::new();

    for list in lists {
        for (rank, (chunk, raw_score)) in list.hits.iter().enumerate() {
            let key: Key = (chunk.source.clone(), chunk.chunk_index);
            let rrf_score = list.weight / (RRF_K + rank as f32 + 1.0);

            let entry = score_map.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                SearchHit {
                    source: chunk.source.clone(),
                    chunk_index: chunk.chunk_index,
                    content: chunk.content.clone(),
                    topic: chunk.topic.clone(),
                    bm25_score: 0.0,
                    vector_score: 0.0,
                    combined_score: 0.0,
                }
            });

            match list.method {
                Method::Vector => entry.vector_score = entry.vector_score.max(*raw_score),
                Method::Lexical => entry.bm25_score = entry.bm25_score.max(*raw_score),
            }
            entry.combined_score += rrf_score;
        }
    }

    // Stable sort over first-seen order keeps ties deterministic
    let mut results: Vec<SearchHit> = order
        .into_iter()
        .filter_map(|key| score_map.remove(&key))
        .collect();
    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
    results
}

/// Vector + BM25 retrieval over the same chunk set.
#[derive(Clone)]
pub struct HybridRetriever {
    pub bm25: Arc<Bm25Index>,
    pub vectors: Arc<VectorStore>,
    pub http_client: reqwest::Client,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
}

impl HybridRetriever {
    /// Run both lookups for `question` and fuse them 0.6 / 0.4.
    ///
    /// An embedding failure, or a query embedding whose dimension differs
    /// from the stored vectors, degrades to lexical-only retrieval.
    pub async fn retrieve(
        &self,
        question: &str,
        topics: Option<&[String]>,
    ) -> Result<Vec<SearchHit>> {
        let vector_hits =
            match crate::llm::embeddings::embed_single(&self.http_client, &self.llm, question)
                .await
            {
                Ok(query_embedding) => self.vector_lookup(&query_embedding, topics),
                Err(e) => {
                    tracing::warn!("Vector search skipped: {e:#}");
                    Vec::new()
                }
            };

        let bm25 = self.bm25.clone();
        let q = question.to_string();
        let owned_topics = topics.map(|t| t.to_vec());
        let k = self.retrieval.bm25_k;
        let bm25_hits =
            tokio::task::spawn_blocking(move || bm25.search(&q, k, owned_topics.as_deref()))
                .await??;

        tracing::info!(
            "Retrieved {} vector and {} BM25 hits",
            vector_hits.len(),
            bm25_hits.len()
        );

        let limit = self.retrieval.vector_k + self.retrieval.bm25_k;
        Ok(weighted_rrf_fusion(
            &[
                RankedList::vector(vector_hits, VECTOR_WEIGHT),
                RankedList::lexical(bm25_hits, LEXICAL_WEIGHT),
            ],
            limit,
        ))
    }

    fn vector_lookup(&self, query_embedding: &[f32], topics: Option<&[String]>) -> Vec<VectorHit> {
        match self.vectors.dimension() {
            Some(dim) if dim != query_embedding.len() => {
                tracing::warn!(
                    "Vector search skipped: query embedding has {} dimensions but the store holds {dim}; rebuild with `docqa index`",
                    query_embedding.len()
                );
                Vec::new()
            }
            _ => self
                .vectors
                .search(query_embedding, self.retrieval.vector_k, topics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, index: usize) -> Chunk {
        Chunk {
            source: source.to_string(),
            chunk_index: index,
            content: format!("content of {source} chunk {index}"),
            topic: None,
        }
    }

    fn list(method: Method, weight: f32, items: &[(&str, f32)]) -> RankedList {
        RankedList {
            method,
            weight,
            hits: items.iter().map(|(s, score)| (chunk(s, 0), *score)).collect(),
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(weighted_rrf_fusion(&[], 10).is_empty());
        let empty = list(Method::Vector, VECTOR_WEIGHT, &[]);
        assert!(weighted_rrf_fusion(&[empty], 10).is_empty());
    }

    #[test]
    fn test_single_list_keeps_rank_order() {
        let lexical = list(Method::Lexical, LEXICAL_WEIGHT, &[("a.md", 5.0), ("b.md", 3.0)]);
        let results = weighted_rrf_fusion(&[lexical], 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "a.md");
        let expected = LEXICAL_WEIGHT / (RRF_K + 1.0);
        assert!((results[0].combined_score - expected).abs() < 1e-6);
        assert_eq!(results[0].bm25_score, 5.0);
        assert_eq!(results[0].vector_score, 0.0);
    }

    #[test]
    fn test_vector_weight_beats_lexical_at_same_rank() {
        let vector = list(Method::Vector, VECTOR_WEIGHT, &[("v.md", 0.9)]);
        let lexical = list(Method::Lexical, LEXICAL_WEIGHT, &[("l.md", 7.0)]);
        let results = weighted_rrf_fusion(&[lexical, vector], 10);
        assert_eq!(results[0].source, "v.md");
        assert_eq!(results[1].source, "l.md");
    }

    #[test]
    fn test_chunk_in_both_lists_accumulates() {
        let vector = list(Method::Vector, VECTOR_WEIGHT, &[("v.md", 0.9), ("both.md", 0.8)]);
        let lexical = list(Method::Lexical, LEXICAL_WEIGHT, &[("both.md", 4.0), ("l.md", 2.0)]);
        let results = weighted_rrf_fusion(&[vector, lexical], 10);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].source, "both.md");
        let expected = VECTOR_WEIGHT / (RRF_K + 2.0) + LEXICAL_WEIGHT / (RRF_K + 1.0);
        assert!((results[0].combined_score - expected).abs() < 1e-6);
        assert_eq!(results[0].vector_score, 0.8);
        assert_eq!(results[0].bm25_score, 4.0);
    }

    #[test]
    fn test_same_source_different_chunks_stay_separate() {
        let vector = RankedList {
            method: Method::Vector,
            weight: VECTOR_WEIGHT,
            hits: vec![(chunk("a.md", 0), 0.9), (chunk("a.md", 1), 0.8)],
        };
        let results = weighted_rrf_fusion(&[vector], 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 0);
        assert_eq!(results[1].chunk_index, 1);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let first = list(Method::Vector, 0.5, &[("x.md", 0.9)]);
        let second = list(Method::Lexical, 0.5, &[("y.md", 1.0)]);
        let results = weighted_rrf_fusion(&[first, second], 10);
        assert_eq!(results[0].source, "x.md");
        assert_eq!(results[1].source, "y.md");
    }

    #[test]
    fn test_limit_respected() {
        let items: Vec<(String, f32)> = (0..20).map(|i| (format!("f{i}.md"), 1.0)).collect();
        let borrowed: Vec<(&str, f32)> = items.iter().map(|(s, v)| (s.as_str(), *v)).collect();
        let lexical = list(Method::Lexical, LEXICAL_WEIGHT, &borrowed);
        assert_eq!(weighted_rrf_fusion(&[lexical], 5).len(), 5);
    }

    fn retriever_with_vectors(dir: &std::path::Path, embeddings: Vec<Vec<f32>>) -> HybridRetriever {
        let chunks: Vec<Chunk> = (0..embeddings.len()).map(|i| chunk("a.md", i)).collect();
        let vectors = VectorStore::open_or_create(&dir.join("vectors")).unwrap();
        vectors.replace_all(&chunks, embeddings).unwrap();
        HybridRetriever {
            bm25: Arc::new(Bm25Index::open_or_create(&dir.join("bm25")).unwrap()),
            vectors: Arc::new(vectors),
            http_client: reqwest::Client::new(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }

    #[test]
    fn test_vector_lookup_skips_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let embeddings = (0..6).map(|i| vec![1.0, i as f32]).collect();
        let retriever = retriever_with_vectors(dir.path(), embeddings);

        assert!(retriever.vector_lookup(&[1.0, 0.0, 0.0], None).is_empty());

        let hits = retriever.vector_lookup(&[1.0, 0.0], None);
        assert_eq!(hits.len(), retriever.retrieval.vector_k);
        assert_eq!(hits[0].chunk.chunk_index, 0);
    }

    #[test]
    fn test_vector_lookup_on_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = retriever_with_vectors(dir.path(), Vec::new());
        assert!(retriever.vector_lookup(&[1.0, 0.0], None).is_empty());
    }
}
