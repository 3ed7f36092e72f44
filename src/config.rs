use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the source documents
    pub docs_dir: PathBuf,
    /// Where the vector store, BM25 index and manifest are written
    pub index_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// File extensions picked up by the loader (lower-case, no dot)
    pub doc_extensions: Vec<String>,
    /// Optional file replacing the built-in instruction template
    pub prompt_path: Option<PathBuf>,
    /// LLM provider configuration
    pub llm: LlmConfig,
    pub chunking: ChunkConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "ollama"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for completions
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    pub temperature: f32,
}

/// Chunk sizes are counted in characters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Hits taken from the vector store per question
    pub vector_k: usize,
    /// Hits taken from the BM25 index per question
    pub bm25_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("./data"),
            index_dir: PathBuf::from("./vectorstore"),
            bind_addr: "127.0.0.1:5000".to_string(),
            doc_extensions: vec!["md".to_string(), "txt".to_string()],
            prompt_path: None,
            llm: LlmConfig::default(),
            chunking: ChunkConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            api_key: None,
            temperature: 0.2,
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            vector_k: 4,
            bm25_k: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DOCQA_DOCS_DIR") {
            config.docs_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DOCQA_INDEX_DIR") {
            config.index_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("DOCQA_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(exts) = std::env::var("DOCQA_DOC_EXTENSIONS") {
            let parsed = parse_extensions(&exts);
            if !parsed.is_empty() {
                config.doc_extensions = parsed;
            }
        }
        if let Ok(path) = std::env::var("DOCQA_PROMPT_PATH") {
            config.prompt_path = Some(PathBuf::from(path));
        }
        if let Ok(val) = std::env::var("DOCQA_CHUNK_SIZE") {
            if let Ok(v) = val.parse() {
                config.chunking.chunk_size = v;
            }
        }
        if let Ok(val) = std::env::var("DOCQA_CHUNK_OVERLAP") {
            if let Ok(v) = val.parse() {
                config.chunking.chunk_overlap = v;
            }
        }
        if let Ok(val) = std::env::var("DOCQA_VECTOR_K") {
            if let Ok(v) = val.parse() {
                config.retrieval.vector_k = v;
            }
        }
        if let Ok(val) = std::env::var("DOCQA_BM25_K") {
            if let Ok(v) = val.parse() {
                config.retrieval.bm25_k = v;
            }
        }

        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        // LLM_* names take precedence over the OpenAI-specific ones
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("LLM_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                config.llm.temperature = v;
            }
        }

        config.normalize();
        config
    }

    /// Clamp values that would break chunking or retrieval.
    pub fn normalize(&mut self) {
        if self.chunking.chunk_size == 0 {
            self.chunking.chunk_size = ChunkConfig::default().chunk_size;
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            let clamped = self.chunking.chunk_size / 5;
            tracing::warn!(
                "Chunk overlap {} is not smaller than chunk size {}, using {clamped}",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
            self.chunking.chunk_overlap = clamped;
        }
        self.retrieval.vector_k = self.retrieval.vector_k.max(1);
        self.retrieval.bm25_k = self.retrieval.bm25_k.max(1);
    }

    pub fn bm25_dir(&self) -> PathBuf {
        self.index_dir.join("bm25")
    }

    /// Where `docqa index` builds the next BM25 index before swapping it in.
    pub fn bm25_staging_dir(&self) -> PathBuf {
        self.index_dir.join("bm25.staging")
    }

    pub fn vector_dir(&self) -> PathBuf {
        self.index_dir.join("vectors")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.index_dir.join("manifest.json")
    }
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
