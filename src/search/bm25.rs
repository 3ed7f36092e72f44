use anyhow::{Context, Result};
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use crate::models::Chunk;

/// BM25 search index built on tantivy.
pub struct Bm25Index {
    index: Index,
    reader: IndexReader,
    // Field handles
    f_source: Field,
    f_chunk_index: Field,
    f_content: Field,
    f_topic: Field,
}

#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub chunk: Chunk,
    pub score: f32,
}

fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field("source", STRING | STORED);
    schema_builder.add_u64_field("chunk_index", NumericOptions::default() | STORED);
    schema_builder.add_text_field("content", TEXT | STORED);
    schema_builder.add_text_field("topic", STRING | STORED);
    schema_builder.build()
}

impl Bm25Index {
    /// Create or open a BM25 index at the given directory.
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;

        let index = if index_dir.join("meta.json").exists() {
            Index::open_in_dir(index_dir).context("Failed to open existing tantivy index")?
        } else {
            Index::create_in_dir(index_dir, build_schema())
                .context("Failed to create tantivy index")?
        };

        let schema = index.schema();
        let f_source = schema.get_field("source")?;
        let f_chunk_index = schema.get_field("chunk_index")?;
        let f_content = schema.get_field("content")?;
        let f_topic = schema.get_field("topic")?;

        // Only `replace_all` on this handle reloads; a rebuild by another
        // process is picked up on the next open, together with the vectors.
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create reader")?;

        Ok(Self {
            index,
            reader,
            f_source,
            f_chunk_index,
            f_content,
            f_topic,
        })
    }

    /// Drop every indexed chunk and index `chunks` in a single commit.
    pub fn replace_all(&self, chunks: &[Chunk]) -> Result<()> {
        let mut writer: IndexWriter = self
            .index
            .writer(50_000_000)
            .context("Failed to create index writer")?;

        writer
            .delete_all_documents()
            .context("Failed to clear index")?;

        for chunk in chunks {
            let mut document = doc!(
                self.f_source => chunk.source.clone(),
                self.f_chunk_index => chunk.chunk_index as u64,
                self.f_content => chunk.content.clone(),
            );
            if let Some(topic) = &chunk.topic {
                document.add_text(self.f_topic, topic);
            }
            writer.add_document(document)?;
        }

        writer.commit().context("Failed to commit index")?;
        self.reader.reload().context("Failed to reload reader")?;
        Ok(())
    }

    /// Search the index and return scored hits.
    ///
    /// The query is parsed leniently so free-form questions with punctuation
    /// or stray query syntax never fail. `topics` restricts hits to chunks
    /// tagged with one of the given topics without affecting scores.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        topics: Option<&[String]>,
    ) -> Result<Vec<Bm25Hit>> {
        if query_str.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, vec![self.f_content]);
        let (text_query, errors) = query_parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            tracing::debug!("Lenient parse of {query_str:?} dropped {} fragment(s)", errors.len());
        }

        let query: Box<dyn Query> = match topics {
            Some(topics) => {
                let topic_clauses: Vec<(Occur, Box<dyn Query>)> = topics
                    .iter()
                    .map(|t| {
                        let term = Term::from_field_text(self.f_topic, t);
                        let q: Box<dyn Query> =
                            Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                        (Occur::Should, q)
                    })
                    .collect();
                let topic_filter = ConstScoreQuery::new(Box::new(BooleanQuery::new(topic_clauses)), 0.0);
                Box::new(BooleanQuery::new(vec![
                    (Occur::Must, text_query),
                    (Occur::Must, Box::new(topic_filter)),
                ]))
            }
            None => text_query,
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("Search failed")?;

        let mut hits = Vec::with_capacity(top_docs.len());

        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            let source = doc
                .get_first(self.f_source)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let chunk_index = doc
                .get_first(self.f_chunk_index)
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize;

            let content = doc
                .get_first(self.f_content)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let topic = doc
                .get_first(self.f_topic)
                .and_then(|v| v.as_str())
                .map(str::to_string);

            hits.push(Bm25Hit {
                chunk: Chunk {
                    source,
                    chunk_index,
                    content,
                    topic,
                },
                score,
            });
        }

        Ok(hits)
    }

    /// Number of chunks currently searchable.
    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, index: usize, content: &str, topic: Option<&str>) -> Chunk {
        Chunk {
            source: source.into(),
            chunk_index: index,
            content: content.into(),
            topic: topic.map(str::to_string),
        }
    }

    fn sample() -> Vec<Chunk> {
        vec![
            chunk(
                "09-salesprocess-compliance-checklist.md",
                0,
                "Stage 9 of the sales process is the compliance checklist.",
                Some("kpmg_sales_process"),
            ),
            chunk(
                "powered-tom-maturity-model.md",
                0,
                "The maturity model is a TOM asset used during the Validate phase.",
                Some("powered_tom_assets"),
            ),
            chunk(
                "validate-phase.md",
                2,
                "Validate covers system integration testing and data migration.",
                Some("powered_phase_delivery"),
            ),
        ]
    }

    #[test]
    fn test_index_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();
        index.replace_all(&sample()).unwrap();
        assert_eq!(index.doc_count(), 3);

        let hits = index.search("compliance checklist", 10, None).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].chunk.source, "09-salesprocess-compliance-checklist.md");
        assert_eq!(hits[0].chunk.topic.as_deref(), Some("kpmg_sales_process"));
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_natural_language_question_with_punctuation() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();
        index.replace_all(&sample()).unwrap();

        let hits = index
            .search("What happens in Validate? (testing & migration)", 10, None)
            .unwrap();
        assert!(hits.iter().any(|h| h.chunk.source == "validate-phase.md"));
        let validate = hits
            .iter()
            .find(|h| h.chunk.source == "validate-phase.md")
            .unwrap();
        assert_eq!(validate.chunk.chunk_index, 2);
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();
        index.replace_all(&sample()).unwrap();
        assert!(index.search("   ", 10, None).unwrap().is_empty());
    }

    #[test]
    fn test_topic_filter() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();
        index.replace_all(&sample()).unwrap();

        let topics = vec!["powered_tom_assets".to_string()];
        let hits = index.search("validate", 10, Some(&topics)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.source, "powered-tom-maturity-model.md");
    }

    #[test]
    fn test_replace_all_drops_old_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let index = Bm25Index::open_or_create(dir.path()).unwrap();
        index.replace_all(&sample()).unwrap();
        index
            .replace_all(&[chunk("glossary.md", 0, "Regression testing definition", None)])
            .unwrap();

        assert_eq!(index.doc_count(), 1);
        assert!(index.search("compliance", 10, None).unwrap().is_empty());
        let hits = index.search("regression", 10, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].chunk.topic.is_none());
    }

    #[test]
    fn test_reopen_existing_index() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = Bm25Index::open_or_create(dir.path()).unwrap();
            index.replace_all(&sample()).unwrap();
        }
        let reopened = Bm25Index::open_or_create(dir.path()).unwrap();
        assert_eq!(reopened.doc_count(), 3);
    }

    #[test]
    fn test_open_handle_ignores_rebuild_by_another_handle() {
        let dir = tempfile::tempdir().unwrap();
        let serving = Bm25Index::open_or_create(dir.path()).unwrap();
        serving.replace_all(&sample()).unwrap();

        {
            let rebuilder = Bm25Index::open_or_create(dir.path()).unwrap();
            rebuilder
                .replace_all(&[chunk("glossary.md", 0, "Regression testing definition", None)])
                .unwrap();
        }
        // Longer than tantivy's on-commit reload delay
        std::thread::sleep(std::time::Duration::from_millis(1200));

        assert_eq!(serving.doc_count(), 3);
        assert!(serving.search("regression", 10, None).unwrap().is_empty());
        assert_eq!(Bm25Index::open_or_create(dir.path()).unwrap().doc_count(), 1);
    }
}
