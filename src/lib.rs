//! # docqa
//!
//! Question answering over a small corpus of methodology documents.
//!
//! ## Architecture
//!
//! ```text
//!   docs dir ──► loader (topic tags) ──► chunking ──► indexer
//!                                                      │
//!                              ┌───────────────────────┴──────────┐
//!                              ▼                                  ▼
//!                   vector store (embeddings)            BM25 index (tantivy)
//!                              │ top 4                            │ top 5
//!                              └───────────────┬──────────────────┘
//!                                              ▼
//!                              weighted RRF fusion (0.6 / 0.4)
//!                                              │
//!                                              ▼
//!                          prompt template ──► chat completion
//!                                              │
//!                                              ▼
//!                          answer + SOURCES ──► HTML (markdown or <pre>)
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for paths, chunking, retrieval and LLM settings
//! - [`models`] - Shared data types: `Document`, `Chunk`, `SearchHit`, `Answer`, `IndexManifest`
//! - [`loader`] - Corpus walking and filename-based topic tagging
//! - [`chunking`] - Recursive character splitter with overlap
//! - [`search::vector`] - In-memory vector store with cosine similarity and disk persistence
//! - [`search::bm25`] - BM25 full-text index powered by tantivy
//! - [`search::hybrid`] - Weighted Reciprocal Rank Fusion of both rankings
//! - [`llm::embeddings`] - Batch embedding generation via OpenAI-compatible or Ollama APIs
//! - [`llm::prompt`] - Instruction template and context formatting
//! - [`llm::completion`] - Chat completion and source citation parsing
//! - [`llm::history`] - Bounded conversation memory for interactive follow-ups
//! - [`indexer`] - Batch job rebuilding both indexes and the manifest
//! - [`api`] - Axum handlers and HTML rendering for the question form
//! - [`state`] - Shared application state
//! - [`cli`] - `serve`, `index` and `ask` subcommands

pub mod api;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod indexer;
pub mod llm;
pub mod loader;
pub mod models;
pub mod search;
pub mod state;
