use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::indexer::read_manifest;
use crate::llm::prompt::PromptTemplate;
use crate::models::IndexManifest;
use crate::search::bm25::Bm25Index;
use crate::search::hybrid::HybridRetriever;
use crate::search::vector::VectorStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub retriever: HybridRetriever,
    pub prompt: Arc<PromptTemplate>,
    /// Manifest of the index on disk, if one has been built
    pub manifest: Option<IndexManifest>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        // Ensure index directories exist
        std::fs::create_dir_all(config.bm25_dir())?;
        std::fs::create_dir_all(config.vector_dir())?;

        let bm25 = Bm25Index::open_or_create(&config.bm25_dir())?;
        let vectors = VectorStore::open_or_create(&config.vector_dir())?;
        let prompt = PromptTemplate::load(config.prompt_path.as_deref())?;
        let manifest = read_manifest(&config.manifest_path())?;

        match &manifest {
            Some(m) if m.embedding_model != config.llm.embedding_model => {
                tracing::warn!(
                    "Index was built with embedding model {} but {} is configured; rebuild with `docqa index`",
                    m.embedding_model,
                    config.llm.embedding_model
                );
            }
            Some(m) => tracing::info!(
                "Index built {} with {} chunks",
                m.built_at.format("%Y-%m-%d %H:%M UTC"),
                m.chunk_count
            ),
            None => tracing::warn!(
                "No index found in {}; run `docqa index` first",
                config.index_dir.display()
            ),
        }

        let retriever = HybridRetriever {
            bm25: Arc::new(bm25),
            vectors: Arc::new(vectors),
            http_client: build_http_client()?,
            llm: config.llm.clone(),
            retrieval: config.retrieval,
        };

        Ok(Self {
            config,
            retriever,
            prompt: Arc::new(prompt),
            manifest,
        })
    }
}

/// HTTP client for the embedding and completion APIs.
pub fn build_http_client() -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(120))
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_on_empty_index_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            index_dir: dir.path().join("vectorstore"),
            ..Config::default()
        };
        let state = AppState::new(config).unwrap();
        assert!(state.manifest.is_none());
        assert_eq!(state.retriever.vectors.entry_count(), 0);
        assert_eq!(state.retriever.bm25.doc_count(), 0);
    }

    #[test]
    fn test_new_rejects_bad_prompt_override() {
        let dir = tempfile::tempdir().unwrap();
        let prompt_path = dir.path().join("prompt.txt");
        std::fs::write(&prompt_path, "no placeholders here").unwrap();
        let config = Config {
            index_dir: dir.path().join("vectorstore"),
            prompt_path: Some(prompt_path),
            ..Config::default()
        };
        assert!(AppState::new(config).is_err());
    }
}
