//! `ragchat search`: retrieval without a model call.
//!
//! Prints the ranked matches for a query exactly as a chat session would
//! inject them, which makes it the quickest way to check what the store
//! returns for a question.

use anyhow::Result;

use ragchat_core::models::Match;
use ragchat_core::retrieve::retrieve;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.top_k);
    if k == 0 {
        anyhow::bail!("--k must be >= 1");
    }

    let store = SqliteStore::open(config).await?;
    let matches = retrieve(&store, query, k).await?;

    if matches.is_empty() {
        println!("No results.");
    } else {
        for m in &matches {
            print!("{}", format_match(m));
        }
    }

    store.pool().close().await;
    Ok(())
}

fn format_match(m: &Match) -> String {
    let kind = m.metadata.get("kind").map(String::as_str).unwrap_or("record");
    let score = m
        .score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "-".to_string());
    let excerpt: String = m.text.replace('\n', " ").chars().take(160).collect();

    let mut out = format!("{}. [{}] {} / {}\n", m.rank + 1, score, kind, m.id);
    if let Some(q) = m.metadata.get("question") {
        out.push_str(&format!("    question: {}\n", q));
    }
    out.push_str(&format!("    excerpt: \"{}\"\n", excerpt.trim()));
    out.push('\n');
    out
}
