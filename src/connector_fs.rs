//! Document connector.
//!
//! Walks `connectors.docs.root`, keeps files matching the include globs and
//! none of the exclude globs, extracts their text, and chunks it into
//! [`SourceItem::Chunk`]s. The document identity is the path relative to the
//! root, so chunk ids stay stable across runs.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use ragchat_core::chunk::chunk_document;
use ragchat_core::models::{ExtractBatch, SourceItem};
use ragchat_core::RagError;

use crate::config::DocsConnectorConfig;
use crate::extract::{content_type_for, extract_text, MIME_TEXT};

pub fn scan_docs(config: &DocsConnectorConfig, max_tokens: usize) -> Result<ExtractBatch> {
    let root = &config.root;
    if !root.exists() {
        bail!("Docs connector root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        files.push((rel_str, path.to_path_buf()));
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut batch = ExtractBatch::default();
    for (rel_str, path) in &files {
        match file_to_chunks(path, rel_str, max_tokens) {
            Ok(items) if items.is_empty() => debug!(document = %rel_str, "no text, skipped"),
            Ok(items) => {
                debug!(document = %rel_str, chunks = items.len(), "chunked document");
                for item in items {
                    batch.push(item);
                }
            }
            Err(err) => {
                warn!(document = %rel_str, error = %err, "skipping document");
                batch.skip(err);
            }
        }
    }

    Ok(batch)
}

fn file_to_chunks(
    path: &Path,
    relative_path: &str,
    max_tokens: usize,
) -> std::result::Result<Vec<SourceItem>, RagError> {
    let content_type = content_type_for(path).unwrap_or(MIME_TEXT);
    let bytes = std::fs::read(path).map_err(|e| RagError::extraction(relative_path, e.to_string()))?;
    let text = extract_text(&bytes, content_type)
        .map_err(|e| RagError::extraction(relative_path, e.to_string()))?;

    Ok(chunk_document(relative_path, &text, max_tokens, content_type)
        .into_iter()
        .map(SourceItem::Chunk)
        .collect())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
