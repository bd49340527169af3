//! Core data models.
//!
//! Source items flow in from extractors, are normalized into [`Record`]s,
//! stored, and come back out of retrieval as [`Match`]es that the
//! conversation renders into [`Turn`]s.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Structured string fields attached to a record.
///
/// A `BTreeMap` so that rendering and serialization are deterministic.
pub type Metadata = BTreeMap<String, String>;

/// Normalized unit of ingestible knowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Stable, source-derived identifier. Unique within a store.
    pub id: String,
    /// Content handed to the similarity index.
    pub text: String,
    pub metadata: Metadata,
}

/// A ranked retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Position in the result list, 0 = most similar.
    pub rank: usize,
    /// Backend similarity, higher is better. `None` when the backend
    /// only reports an ordering.
    pub score: Option<f64>,
}

/// One question/answer pair from a curated FAQ list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

/// A contiguous span of an extracted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// Stable document identity (e.g. path relative to the connector root).
    pub document: String,
    /// Byte offset of the chunk's first character in the document text.
    pub offset: usize,
    /// Position of the chunk within the document, starting at 0.
    pub index: usize,
    pub text: String,
    pub content_type: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// Kind of change a commit applied to one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
            ChangeType::Renamed => "renamed",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub change: ChangeType,
    pub path: String,
    /// Source path of a rename.
    pub previous_path: Option<String>,
}

/// One commit from version-control history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitItem {
    pub hash: String,
    pub author: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub changed_files: Vec<ChangedFile>,
}

/// Raw item produced by an extractor, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    Faq(FaqItem),
    Chunk(DocumentChunk),
    Commit(CommitItem),
}

impl SourceItem {
    /// Short label for the variant, also stored as `metadata.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceItem::Faq(_) => "faq",
            SourceItem::Chunk(_) => "chunk",
            SourceItem::Commit(_) => "commit",
        }
    }
}

/// Output of one extraction run: the well-formed items plus every item
/// that was skipped as malformed.
#[derive(Debug, Default)]
pub struct ExtractBatch {
    pub items: Vec<SourceItem>,
    pub skipped: Vec<RagError>,
}

impl ExtractBatch {
    pub fn push(&mut self, item: SourceItem) {
        self.items.push(item);
    }

    pub fn skip(&mut self, err: RagError) {
        self.skipped.push(err);
    }

    pub fn extend(&mut self, other: ExtractBatch) {
        self.items.extend(other.items);
        self.skipped.extend(other.skipped);
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Retrieved knowledge injected ahead of a user turn.
    Context,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Context => "context",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn context(content: impl Into<String>) -> Self {
        Self::new(Role::Context, content)
    }
}
