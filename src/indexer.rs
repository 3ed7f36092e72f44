//! Batch job that rebuilds the vector store, the BM25 index and the manifest.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;

use crate::chunking::{chunk_documents, RecursiveSplitter};
use crate::config::Config;
use crate::llm::embeddings::embed_batch;
use crate::loader::{load_documents, TopicRules};
use crate::models::{Chunk, IndexManifest};
use crate::search::bm25::Bm25Index;
use crate::search::vector::VectorStore;
use crate::state::build_http_client;

/// Texts sent per progress step; `embed_batch` splits further per provider.
const EMBED_STEP: usize = 256;

const UNTAGGED: &str = "untagged";

/// Load, chunk, embed and index the whole corpus, replacing any previous index.
pub async fn build_index(config: &Config) -> Result<IndexManifest> {
    let rules = TopicRules::default();
    let documents = load_documents(&config.docs_dir, &config.doc_extensions, &rules)?;
    if documents.is_empty() {
        anyhow::bail!(
            "No documents with extensions [{}] found in {}",
            config.doc_extensions.join(", "),
            config.docs_dir.display()
        );
    }
    tracing::info!("Loaded {} documents", documents.len());

    let splitter = RecursiveSplitter::from_config(&config.chunking);
    let chunks = chunk_documents(&documents, &splitter);
    if chunks.is_empty() {
        anyhow::bail!("Documents in {} produced no chunks", config.docs_dir.display());
    }
    tracing::info!("Split into {} chunks", chunks.len());

    let client = build_http_client()?;
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let mut embeddings = Vec::with_capacity(texts.len());
    for step in texts.chunks(EMBED_STEP) {
        let batch = embed_batch(&client, &config.llm, step)
            .await
            .context("Failed to embed chunks")?;
        embeddings.extend(batch);
        tracing::info!("Embedded {}/{} chunks", embeddings.len(), texts.len());
    }

    std::fs::create_dir_all(&config.index_dir)?;

    // The live indexes are untouched until the staged BM25 index has committed
    let staging_dir = config.bm25_staging_dir();
    let staged = staging_dir.clone();
    let bm25_chunks = chunks.clone();
    tokio::task::spawn_blocking(move || stage_bm25(&staged, &bm25_chunks)).await??;

    let vectors = VectorStore::open_or_create(&config.vector_dir())?;
    if let Err(e) = vectors.replace_all(&chunks, embeddings) {
        if let Err(cleanup) = std::fs::remove_dir_all(&staging_dir) {
            tracing::warn!("Failed to remove {}: {cleanup}", staging_dir.display());
        }
        return Err(e);
    }
    promote_bm25(&staging_dir, &config.bm25_dir())?;

    let manifest = IndexManifest {
        built_at: Utc::now(),
        document_count: documents.len(),
        chunk_count: chunks.len(),
        embedding_model: config.llm.embedding_model.clone(),
        topics: topic_histogram(&chunks),
    };
    write_manifest(&config.manifest_path(), &manifest)?;

    tracing::info!(
        "Index built: {} documents, {} chunks in {}",
        manifest.document_count,
        manifest.chunk_count,
        config.index_dir.display()
    );
    Ok(manifest)
}

/// Build a fresh BM25 index in `staging_dir`, clearing any leftover from an
/// interrupted run.
fn stage_bm25(staging_dir: &Path, chunks: &[Chunk]) -> Result<()> {
    if staging_dir.is_dir() {
        std::fs::remove_dir_all(staging_dir).context("Failed to clear BM25 staging directory")?;
    }
    let bm25 = Bm25Index::open_or_create(staging_dir)
        .context("Failed to create staged BM25 index")?;
    bm25.replace_all(chunks)
}

fn promote_bm25(staging_dir: &Path, bm25_dir: &Path) -> Result<()> {
    if bm25_dir.exists() {
        std::fs::remove_dir_all(bm25_dir).context("Failed to remove previous BM25 index")?;
    }
    std::fs::rename(staging_dir, bm25_dir).context("Failed to move BM25 index into place")?;
    Ok(())
}

/// Read the manifest, or `None` if no index has been built yet.
pub fn read_manifest(path: &Path) -> Result<Option<IndexManifest>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path).context("Failed to read index manifest")?;
    let manifest = serde_json::from_str(&data).context("Failed to parse index manifest")?;
    Ok(Some(manifest))
}

fn write_manifest(path: &Path, manifest: &IndexManifest) -> Result<()> {
    let data = serde_json::to_string_pretty(manifest)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data).context("Failed to write index manifest")?;
    std::fs::rename(&tmp_path, path).context("Failed to move index manifest into place")?;
    Ok(())
}

fn topic_histogram(chunks: &[Chunk]) -> BTreeMap<String, usize> {
    let mut topics = BTreeMap::new();
    for chunk in chunks {
        let key = chunk.topic.as_deref().unwrap_or(UNTAGGED);
        *topics.entry(key.to_string()).or_insert(0) += 1;
    }
    topics
}
