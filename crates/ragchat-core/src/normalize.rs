//! Source item → [`Record`] normalization and context rendering.
//!
//! Every variant of [`SourceItem`] has one normalizer. All of them are pure
//! and total: the same item always yields the same `id` and `text`, which is
//! what makes re-ingestion of an unchanged source a no-op.
//!
//! | Variant | `id` | `text` |
//! |---------|------|--------|
//! | FAQ | question | `question + " " + answer` |
//! | Document chunk | `"{document}#{offset}"` | chunk text |
//! | Commit | commit hash | commit / author / date / message / changed files |
//!
//! FAQ ids are the question text itself. Two textually identical questions
//! collapse into one record, which is acceptable for a curated list.

use chrono::SecondsFormat;

use crate::models::{
    ChangeType, ChangedFile, CommitItem, DocumentChunk, FaqItem, Match, Metadata, Record,
    SourceItem,
};

pub const KIND_FAQ: &str = "faq";
pub const KIND_CHUNK: &str = "chunk";
pub const KIND_COMMIT: &str = "commit";

pub fn normalize(item: &SourceItem) -> Record {
    match item {
        SourceItem::Faq(faq) => normalize_faq(faq),
        SourceItem::Chunk(chunk) => normalize_chunk(chunk),
        SourceItem::Commit(commit) => normalize_commit(commit),
    }
}

pub fn normalize_all(items: &[SourceItem]) -> Vec<Record> {
    items.iter().map(normalize).collect()
}

pub fn normalize_faq(faq: &FaqItem) -> Record {
    let mut metadata = Metadata::new();
    metadata.insert("kind".to_string(), KIND_FAQ.to_string());
    metadata.insert("question".to_string(), faq.question.clone());
    metadata.insert("answer".to_string(), faq.answer.clone());

    Record {
        id: faq.question.clone(),
        text: format!("{} {}", faq.question, faq.answer),
        metadata,
    }
}

/// Stable chunk id derived from the (document, offset) pair.
pub fn chunk_id(document: &str, offset: usize) -> String {
    format!("{}#{}", document, offset)
}

pub fn normalize_chunk(chunk: &DocumentChunk) -> Record {
    let mut metadata = Metadata::new();
    metadata.insert("kind".to_string(), KIND_CHUNK.to_string());
    metadata.insert("document".to_string(), chunk.document.clone());
    metadata.insert("offset".to_string(), chunk.offset.to_string());
    metadata.insert("index".to_string(), chunk.index.to_string());
    metadata.insert("content_type".to_string(), chunk.content_type.clone());
    metadata.insert("hash".to_string(), chunk.hash.clone());

    Record {
        id: chunk_id(&chunk.document, chunk.offset),
        text: chunk.text.clone(),
        metadata,
    }
}

pub fn normalize_commit(commit: &CommitItem) -> Record {
    let timestamp = commit.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);
    let changed = render_changed_files(&commit.changed_files);

    let mut metadata = Metadata::new();
    metadata.insert("kind".to_string(), KIND_COMMIT.to_string());
    metadata.insert("author".to_string(), commit.author.clone());
    metadata.insert("email".to_string(), commit.email.clone());
    metadata.insert("timestamp".to_string(), timestamp.clone());
    metadata.insert("message".to_string(), commit.message.clone());
    metadata.insert("changed_files".to_string(), changed.clone());

    let text = format!(
        "Commit: {}\nAuthor: {} <{}>\nDate: {}\nMessage: {}\nChanged files:\n{}",
        commit.hash, commit.author, commit.email, timestamp, commit.message, changed
    );

    Record {
        id: commit.hash.clone(),
        text,
        metadata,
    }
}

/// One line per file: `"modified: src/lib.rs"`, `"renamed: a.rs -> b.rs"`.
pub fn render_changed_files(files: &[ChangedFile]) -> String {
    if files.is_empty() {
        return "(none)".to_string();
    }
    files
        .iter()
        .map(|f| match (&f.change, &f.previous_path) {
            (ChangeType::Renamed, Some(prev)) => format!("{}: {} -> {}", f.change, prev, f.path),
            _ => format!("{}: {}", f.change, f.path),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-readable rendering of a match for a context turn.
pub fn render_context(m: &Match) -> String {
    let field = |key: &str| m.metadata.get(key).map(String::as_str).unwrap_or("");

    match m.metadata.get("kind").map(String::as_str) {
        Some(KIND_FAQ) => format!(
            "Question: {}\nAnswer: {}\n",
            field("question"),
            field("answer")
        ),
        Some(KIND_COMMIT) => format!(
            "Commit: {}\nAuthor: {} <{}>\nDate: {}\nMessage: {}\nChanged files:\n{}\n",
            m.id,
            field("author"),
            field("email"),
            field("timestamp"),
            field("message"),
            field("changed_files")
        ),
        Some(KIND_CHUNK) => format!(
            "Document: {} (offset {})\n{}\n",
            field("document"),
            field("offset"),
            m.text
        ),
        _ => format!("{}\n{}\n", m.id, m.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_commit() -> CommitItem {
        CommitItem {
            hash: "9fceb02d0ae598e95dc970b74767f19372d61af8".to_string(),
            author: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            message: "Fix overflow in parser".to_string(),
            changed_files: vec![
                ChangedFile {
                    change: ChangeType::Modified,
                    path: "src/parser.rs".to_string(),
                    previous_path: None,
                },
                ChangedFile {
                    change: ChangeType::Renamed,
                    path: "src/lex.rs".to_string(),
                    previous_path: Some("src/lexer.rs".to_string()),
                },
            ],
        }
    }

    #[test]
    fn faq_uses_question_as_id() {
        let record = normalize_faq(&FaqItem {
            question: "Is GitHub free?".to_string(),
            answer: "Yes, for public repositories.".to_string(),
        });
        assert_eq!(record.id, "Is GitHub free?");
        assert_eq!(record.text, "Is GitHub free? Yes, for public repositories.");
        assert_eq!(record.metadata["question"], "Is GitHub free?");
        assert_eq!(record.metadata["answer"], "Yes, for public repositories.");
        assert_eq!(record.metadata["kind"], "faq");
    }

    #[test]
    fn commit_record_is_keyed_by_hash() {
        let record = normalize_commit(&sample_commit());
        assert_eq!(record.id, "9fceb02d0ae598e95dc970b74767f19372d61af8");
        assert_eq!(record.metadata["timestamp"], "2024-03-01T12:30:00Z");
        assert_eq!(
            record.metadata["changed_files"],
            "modified: src/parser.rs\nrenamed: src/lexer.rs -> src/lex.rs"
        );
        assert!(record.text.contains("Message: Fix overflow in parser"));
        assert!(record.text.contains("Author: Ada Lovelace <ada@example.com>"));
    }

    #[test]
    fn chunk_id_comes_from_document_and_offset() {
        let chunk = DocumentChunk {
            document: "guides/setup.md".to_string(),
            offset: 1024,
            index: 3,
            text: "Run the installer.".to_string(),
            content_type: "text/markdown".to_string(),
            hash: "abc".to_string(),
        };
        let record = normalize_chunk(&chunk);
        assert_eq!(record.id, "guides/setup.md#1024");
        assert_eq!(record.metadata["index"], "3");
    }

    #[test]
    fn normalization_is_deterministic() {
        let items = vec![
            SourceItem::Commit(sample_commit()),
            SourceItem::Faq(FaqItem {
                question: "Q".to_string(),
                answer: "A".to_string(),
            }),
        ];
        let first = normalize_all(&items);
        let second = normalize_all(&items);
        assert_eq!(first, second);
    }

    #[test]
    fn renders_each_kind() {
        let faq = normalize_faq(&FaqItem {
            question: "Is GitHub safe?".to_string(),
            answer: "Yes.".to_string(),
        });
        let m = Match {
            id: faq.id,
            text: faq.text,
            metadata: faq.metadata,
            rank: 0,
            score: None,
        };
        assert_eq!(render_context(&m), "Question: Is GitHub safe?\nAnswer: Yes.\n");

        let commit = normalize_commit(&sample_commit());
        let m = Match {
            id: commit.id,
            text: commit.text,
            metadata: commit.metadata,
            rank: 0,
            score: Some(1.0),
        };
        let rendered = render_context(&m);
        assert!(rendered.starts_with("Commit: 9fceb02d"));
        assert!(rendered.contains("Date: 2024-03-01T12:30:00Z\n"));

        let bare = Match {
            id: "note-1".to_string(),
            text: "free text".to_string(),
            metadata: Metadata::new(),
            rank: 0,
            score: None,
        };
        assert_eq!(render_context(&bare), "note-1\nfree text\n");
    }

    #[test]
    fn empty_change_list_renders_placeholder() {
        assert_eq!(render_changed_files(&[]), "(none)");
    }
}
