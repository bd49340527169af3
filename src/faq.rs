//! FAQ extractor.
//!
//! Produces [`SourceItem::Faq`] items either from the built-in GitHub FAQ or
//! from a JSON file holding an array of `{"question": .., "answer": ..}`
//! objects. Entries that are not objects, or that lack a non-empty question
//! or answer, are skipped and reported in [`ExtractBatch::skipped`].

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use ragchat_core::models::{ExtractBatch, FaqItem, SourceItem};
use ragchat_core::RagError;

use crate::config::FaqConnectorConfig;

/// The built-in GitHub FAQ as `(question, answer)` pairs.
pub const GITHUB_FAQ: &[(&str, &str)] = &[
    (
        "What is GitHub and how does it work?",
        "GitHub is the home for all developers—a platform where you can share code, contribute to open source projects, or even automate your workflow with tools like GitHub Actions and Packages. If you’re just getting started with GitHub, you may know us best as a place for version control and collaboration.",
    ),
    (
        "Why is GitHub so popular?",
        "GitHub is built by developers for developers, and we’re proud to be home to the world’s largest open source community. With 50 million developers and millions more open source projects, GitHub has become the go-to place to collaborate and build software together.",
    ),
    (
        "Who is GitHub for?",
        "You! And it’s not just developers who build on GitHub—Fortune 500 companies, small teams, project managers, and college professors all use GitHub to do their best work, in one place.",
    ),
    (
        "Do people use GitHub only for code?",
        "Nope. Like we mentioned above, different people and teams use GitHub for different projects. While we got our start as a version control platform, GitHub is now used to manage teams, share resumes, find new projects, track work, and host discussions, just to name a few.",
    ),
    (
        "Why should I use GitHub?",
        "GitHub isn’t just a place to share code. It’s a chance to do something bigger. On GitHub, you can shape the future of software, work with the best developers in the world, and grow your skills and help others.",
    ),
    (
        "Are Git and GitHub the same?",
        "Git is a version control system (VCS). GitHub is the platform where Git repositories can be hosted and teams can work on them together.",
    ),
    (
        "Do I need Git in order to use GitHub?",
        "Nope. GitHub repositories can be accessed from both Git and Subversion (SVN) clients.",
    ),
    (
        "Is GitHub safe?",
        "Millions of teams trust GitHub to keep their work safe. While security incidents can happen, our GitHub Security Team goes beyond industry standards to keep you and your code secure.",
    ),
    (
        "Is GitHub free?",
        "All GitHub users and teams get free, unlimited access to public and private repositories. But if you’re looking for more collaboration features, security controls, and deployment options, we also offer paid plans: GitHub Team at $4 USD per user/month and Enterprise $21 USD per user/month.",
    ),
    (
        "Is GitHub owned by Microsoft?",
        "Yes. Microsoft acquired GitHub in 2018.",
    ),
    (
        "How do I start using GitHub?",
        "We saved the best for last. All you need is a GitHub account and internet access.",
    ),
];

/// Extract FAQ items from the configured file, or the built-in list.
pub fn scan_faq(config: Option<&FaqConnectorConfig>) -> Result<ExtractBatch> {
    match config.and_then(|c| c.file.as_deref()) {
        Some(path) => load_faq_file(path),
        None => Ok(builtin_faq()),
    }
}

pub fn builtin_faq() -> ExtractBatch {
    let mut batch = ExtractBatch::default();
    for (question, answer) in GITHUB_FAQ {
        batch.push(SourceItem::Faq(FaqItem {
            question: question.to_string(),
            answer: answer.to_string(),
        }));
    }
    batch
}

pub fn load_faq_file(path: &Path) -> Result<ExtractBatch> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read FAQ file: {}", path.display()))?;
    parse_faq_json(&content)
        .with_context(|| format!("Failed to parse FAQ file: {}", path.display()))
}

/// Parse a JSON array of FAQ entries.
///
/// A document that is not a JSON array is an error. Individual malformed
/// entries are skipped.
pub fn parse_faq_json(content: &str) -> Result<ExtractBatch> {
    let value: Value = serde_json::from_str(content)?;
    let entries = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("expected a JSON array of FAQ entries"))?;

    let mut batch = ExtractBatch::default();
    for (i, entry) in entries.iter().enumerate() {
        let source_id = format!("faq[{}]", i);
        match faq_entry(entry) {
            Ok(item) => batch.push(SourceItem::Faq(item)),
            Err(reason) => batch.skip(RagError::extraction(source_id, reason)),
        }
    }
    Ok(batch)
}

fn faq_entry(entry: &Value) -> std::result::Result<FaqItem, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| "entry is not an object".to_string())?;
    let field = |name: &str| -> std::result::Result<String, String> {
        match obj.get(name).and_then(Value::as_str).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(format!("missing or empty '{}'", name)),
        }
    };
    Ok(FaqItem {
        question: field("question")?,
        answer: field("answer")?,
    })
}
