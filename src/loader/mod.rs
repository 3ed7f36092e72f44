//! Corpus loading: directory walk plus topic tagging.

pub mod topic;

use anyhow::Result;
use std::path::Path;
use walkdir::WalkDir;

use crate::models::Document;
pub use topic::TopicRules;

/// Load every document under `docs_dir` whose extension is in `extensions`.
///
/// Hidden files and directories are skipped. Files that are not valid UTF-8
/// are skipped with a warning. The result is sorted by source path.
pub fn load_documents(
    docs_dir: &Path,
    extensions: &[String],
    rules: &TopicRules,
) -> Result<Vec<Document>> {
    if !docs_dir.is_dir() {
        anyhow::bail!("Document directory not found: {}", docs_dir.display());
    }

    let mut docs = Vec::new();

    for entry in WalkDir::new(docs_dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !has_extension(path, extensions) {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", path.display());
                continue;
            }
        };

        let source = relative_source(docs_dir, path);
        let topic = rules.tag(path);
        tracing::debug!("Loaded {source} (topic: {})", topic.as_deref().unwrap_or("untagged"));

        docs.push(Document {
            source,
            content,
            topic,
        });
    }

    docs.sort_by(|a, b| a.source.cmp(&b.source));
    Ok(docs)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    extensions.iter().any(|e| *e == ext)
}

fn relative_source(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
