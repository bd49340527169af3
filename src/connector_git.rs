//! Git commit history connector.
//!
//! Runs `git log --name-status` against a local repository and turns every
//! commit into a [`SourceItem::Commit`]. The commit hash is the record id, so
//! re-scanning overlapping history never duplicates a commit.
//!
//! The log is requested in a machine-readable layout:
//!
//! ```text
//! \x1e<hash>\x1f<author>\x1f<email>\x1f<unix time>\x1f<message>\x1d
//! M\tsrc/lib.rs
//! R087\told.rs\tnew.rs
//! ```
//!
//! Commits whose header cannot be parsed are skipped and reported.

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use std::process::Command;
use tracing::{debug, warn};

use ragchat_core::models::{ChangeType, ChangedFile, CommitItem, ExtractBatch, SourceItem};
use ragchat_core::RagError;

use crate::config::GitConnectorConfig;

const RECORD_SEP: char = '\x1e';
const FIELD_SEP: char = '\x1f';
const MESSAGE_END: char = '\x1d';

const LOG_FORMAT: &str = "--format=%x1e%H%x1f%an%x1f%ae%x1f%ct%x1f%B%x1d";

/// Read up to `max_commits` commits reachable from `rev`.
pub fn scan_commits(config: &GitConnectorConfig) -> Result<ExtractBatch> {
    let output = Command::new("git")
        .arg("-C")
        .arg(&config.repo)
        .args(["log", "--no-color", "--name-status", "-M", LOG_FORMAT])
        .arg(format!("--max-count={}", config.max_commits))
        .arg(&config.rev)
        .arg("--")
        .output()
        .with_context(|| "Failed to execute 'git log'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "git log failed in {}: {}",
            config.repo.display(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let batch = parse_git_log(&stdout);
    debug!(
        repo = %config.repo.display(),
        rev = %config.rev,
        commits = batch.items.len(),
        skipped = batch.skipped.len(),
        "read commit log"
    );
    Ok(batch)
}

/// Parse `git log` output produced with [`LOG_FORMAT`] and `--name-status`.
pub fn parse_git_log(output: &str) -> ExtractBatch {
    let mut batch = ExtractBatch::default();

    for (i, entry) in output
        .split(RECORD_SEP)
        .filter(|e| !e.trim().is_empty())
        .enumerate()
    {
        match parse_commit(entry) {
            Ok(commit) => batch.push(SourceItem::Commit(commit)),
            Err(reason) => {
                let source_id = entry
                    .split(FIELD_SEP)
                    .next()
                    .map(str::trim)
                    .filter(|h| !h.is_empty() && h.len() <= 64)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("commit[{}]", i));
                warn!(commit = %source_id, reason = %reason, "skipping malformed commit");
                batch.skip(RagError::extraction(source_id, reason));
            }
        }
    }

    batch
}

fn parse_commit(entry: &str) -> std::result::Result<CommitItem, String> {
    let (header, files) = entry
        .split_once(MESSAGE_END)
        .ok_or_else(|| "missing end-of-message marker".to_string())?;

    let fields: Vec<&str> = header.splitn(5, FIELD_SEP).collect();
    let [hash, author, email, time, message] = fields[..] else {
        return Err(format!("expected 5 header fields, found {}", fields.len()));
    };

    let hash = hash.trim();
    if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("invalid commit hash '{}'", hash));
    }

    let secs: i64 = time
        .trim()
        .parse()
        .map_err(|_| format!("invalid commit time '{}'", time.trim()))?;
    let timestamp = Utc
        .timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| format!("commit time out of range: {}", secs))?;

    Ok(CommitItem {
        hash: hash.to_string(),
        author: author.trim().to_string(),
        email: email.trim().to_string(),
        timestamp,
        message: message.trim().to_string(),
        changed_files: files.lines().filter_map(parse_status_line).collect(),
    })
}

/// One `--name-status` line. Unmerged and unknown statuses are ignored.
fn parse_status_line(line: &str) -> Option<ChangedFile> {
    let mut parts = line.trim().split('\t');
    let status = parts.next()?;
    let first = parts.next()?.to_string();
    let second = parts.next().map(str::to_string);

    let changed = |change, path| ChangedFile {
        change,
        path,
        previous_path: None,
    };

    match status.chars().next()? {
        'A' => Some(changed(ChangeType::Added, first)),
        'M' | 'T' => Some(changed(ChangeType::Modified, first)),
        'D' => Some(changed(ChangeType::Deleted, first)),
        'R' => Some(ChangedFile {
            change: ChangeType::Renamed,
            path: second?,
            previous_path: Some(first),
        }),
        // A copy leaves the source untouched and adds the destination.
        'C' => Some(changed(ChangeType::Added, second?)),
        _ => None,
    }
}
