//! End-to-end tests through the library: connectors, ingestion into the
//! SQLite store, retrieval, and chat sessions with scripted models.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use ragchat::config::{Config, DocsConnectorConfig, GitConnectorConfig};
use ragchat::ingest::{extract, ingest_batch};
use ragchat::sqlite_store::SqliteStore;
use ragchat_core::model::ChatModel;
use ragchat_core::models::{Role, Turn};
use ragchat_core::retrieve::retrieve;
use ragchat_core::session::{Session, SessionEvent};
use ragchat_core::store::memory::InMemoryStore;
use ragchat_core::store::{QueryResponse, Store};
use ragchat_core::RagError;

async fn sqlite_store(tmp: &TempDir) -> (Config, SqliteStore) {
    let config = Config::with_db(tmp.path().join("data/ragchat.sqlite"));
    let store = SqliteStore::open(&config).await.unwrap();
    (config, store)
}

/// Replies with a fixed text and remembers every prompt it was given.
struct ScriptedModel {
    prompts: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedModel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, turns: &[Turn]) -> ragchat_core::Result<String> {
        self.prompts.lock().unwrap().push(turns.to_vec());
        Ok("Yes, GitHub has a free plan.".to_string())
    }
}

/// Counts queries so tests can assert that no retrieval happened.
struct CountingStore<S> {
    inner: S,
    queries: Mutex<usize>,
}

#[async_trait]
impl<S: Store> Store for CountingStore<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }
    async fn list_ids(&self) -> ragchat_core::Result<std::collections::HashSet<String>> {
        self.inner.list_ids().await
    }
    async fn insert(&self, batch: &[ragchat_core::models::Record]) -> ragchat_core::Result<()> {
        self.inner.insert(batch).await
    }
    async fn query(&self, text: &str, k: usize) -> ragchat_core::Result<QueryResponse> {
        *self.queries.lock().unwrap() += 1;
        self.inner.query(text, k).await
    }
    async fn count(&self) -> ragchat_core::Result<usize> {
        self.inner.count().await
    }
}

#[tokio::test]
async fn faq_ingest_is_idempotent_in_sqlite() {
    let tmp = TempDir::new().unwrap();
    let (config, store) = sqlite_store(&tmp).await;
    let batch = extract(&config, "faq").unwrap();
    assert_eq!(batch.items.len(), 11);

    let first = ingest_batch(&store, &batch).await.unwrap();
    assert_eq!(first.inserted, 11);
    assert_eq!(store.count().await.unwrap(), 11);

    let second = ingest_batch(&store, &batch).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.already_present, 11);
    assert_eq!(store.count().await.unwrap(), 11);
}

#[tokio::test]
async fn faq_ingest_is_idempotent_in_memory() {
    let config = Config::with_db("unused.sqlite");
    let store = InMemoryStore::new();
    let batch = extract(&config, "faq").unwrap();

    assert_eq!(ingest_batch(&store, &batch).await.unwrap().inserted, 11);
    assert_eq!(ingest_batch(&store, &batch).await.unwrap().inserted, 0);
    assert_eq!(store.count().await.unwrap(), 11);
}

#[tokio::test]
async fn free_question_retrieves_its_own_record() {
    let tmp = TempDir::new().unwrap();
    let (config, store) = sqlite_store(&tmp).await;
    ingest_batch(&store, &extract(&config, "faq").unwrap())
        .await
        .unwrap();

    let matches = retrieve(&store, "Is GitHub free?", 1).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].rank, 0);
    assert_eq!(
        matches[0].metadata.get("question").map(String::as_str),
        Some("Is GitHub free?")
    );

    let memory = InMemoryStore::new();
    ingest_batch(&memory, &extract(&config, "faq").unwrap())
        .await
        .unwrap();
    let matches = retrieve(&memory, "Is GitHub free?", 1).await.unwrap();
    assert_eq!(matches[0].id, "Is GitHub free?");
}

#[tokio::test]
async fn session_answers_with_context_before_query() {
    let tmp = TempDir::new().unwrap();
    let (config, store) = sqlite_store(&tmp).await;
    ingest_batch(&store, &extract(&config, "faq").unwrap())
        .await
        .unwrap();

    let model = ScriptedModel::new();
    let mut session = Session::new(Arc::new(store), model.clone(), 1);

    let event = session.submit_query("Is GitHub free?").await.unwrap();
    let SessionEvent::Answered(exchange) = event else {
        panic!("expected an answer");
    };
    assert_eq!(exchange.context_count, 1);
    assert_eq!(exchange.reply, "Yes, GitHub has a free plan.");

    let roles: Vec<Role> = session.transcript().iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![Role::Context, Role::User, Role::Assistant]);
    assert_eq!(session.transcript()[1].content, "Is GitHub free?");

    let prompt = &model.prompts.lock().unwrap()[0];
    assert_eq!(prompt.last().map(|t| t.role), Some(Role::User));
}

#[tokio::test]
async fn empty_query_ends_session_without_retrieval() {
    let store = Arc::new(CountingStore {
        inner: InMemoryStore::new(),
        queries: Mutex::new(0),
    });
    let model = ScriptedModel::new();
    let mut session = Session::new(store.clone(), model.clone(), 1);

    let event = session.submit_query("").await.unwrap();
    assert!(matches!(event, SessionEvent::Ended));
    assert!(session.is_ended());
    assert!(session.transcript().is_empty());
    assert_eq!(*store.queries.lock().unwrap(), 0);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn unknown_topic_leaves_transcript_untouched() {
    let tmp = TempDir::new().unwrap();
    let (config, store) = sqlite_store(&tmp).await;
    ingest_batch(&store, &extract(&config, "faq").unwrap())
        .await
        .unwrap();

    let model = ScriptedModel::new();
    let mut session = Session::new(Arc::new(store), model.clone(), 1);

    let err = session
        .submit_query("quantum chromodynamics")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::NoRelevantData));
    assert!(session.transcript().is_empty());
    assert_eq!(model.calls(), 0);

    // The session is still usable afterwards.
    assert!(matches!(
        session.submit_query("Is GitHub free?").await.unwrap(),
        SessionEvent::Answered(_)
    ));
}

#[tokio::test]
async fn chat_loop_over_sqlite_store() {
    let tmp = TempDir::new().unwrap();
    let (config, store) = sqlite_store(&tmp).await;
    ingest_batch(&store, &extract(&config, "faq").unwrap())
        .await
        .unwrap();

    let mut session = Session::new(Arc::new(store), ScriptedModel::new(), 1);
    let mut out = Vec::new();
    ragchat::chat::chat_loop(
        &mut session,
        Cursor::new(b"Is GitHub free?\n\n".to_vec()),
        &mut out,
    )
    .await
    .unwrap();

    let out = String::from_utf8(out).unwrap();
    assert_eq!(
        out,
        "=> Ask Me: \n=> Response: Yes, GitHub has a free plan. \n\n=> Ask Me: \nGoodbye!\n"
    );
}

fn write_docx(path: &Path, paragraphs: &[&str]) {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );

    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    zip.start_file("word/document.xml", opts).unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap();
}

#[tokio::test]
async fn docs_ingest_handles_text_and_docx() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(docs.join("handbook")).unwrap();
    fs::write(
        docs.join("handbook/deploy.md"),
        "# Deploys\n\nProduction deploys run from the release branch.",
    )
    .unwrap();
    write_docx(
        &docs.join("handbook/benefits.docx"),
        &["Employees accrue vacation monthly.", "Dental coverage starts day one."],
    );
    fs::write(docs.join("broken.docx"), b"not a zip archive").unwrap();

    let (mut config, store) = sqlite_store(&tmp).await;
    config.connectors.docs = Some(DocsConnectorConfig {
        root: docs.clone(),
        include_globs: vec!["**/*.md".to_string(), "**/*.docx".to_string()],
        exclude_globs: Vec::new(),
        follow_symlinks: false,
    });

    let batch = extract(&config, "docs").unwrap();
    assert_eq!(batch.items.len(), 2);
    assert_eq!(batch.skipped.len(), 1);

    let report = ingest_batch(&store, &batch).await.unwrap();
    assert_eq!(report.inserted, 2);

    let matches = retrieve(&store, "dental coverage", 1).await.unwrap();
    assert_eq!(matches[0].id, "handbook/benefits.docx#0");
    assert!(matches[0].text.contains("Employees accrue vacation monthly."));

    // Re-extracting unchanged files yields the same ids.
    let again = ingest_batch(&store, &extract(&config, "docs").unwrap())
        .await
        .unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingest_runs_do_not_duplicate() {
    let tmp = TempDir::new().unwrap();
    let (config, store) = sqlite_store(&tmp).await;
    let store = Arc::new(store);
    let batch = Arc::new(extract(&config, "faq").unwrap());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        let batch = Arc::clone(&batch);
        handles.push(tokio::spawn(async move {
            ingest_batch(store.as_ref(), &batch).await.unwrap()
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(store.count().await.unwrap(), 11);
}

fn git(repo: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .env("GIT_AUTHOR_NAME", "Ada")
        .env("GIT_AUTHOR_EMAIL", "ada@example.com")
        .env("GIT_COMMITTER_NAME", "Ada")
        .env("GIT_COMMITTER_EMAIL", "ada@example.com")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn same_commit_from_two_runs_is_stored_once() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    if !git(&repo, &["init", "-q"]) {
        eprintln!("git unavailable, skipping");
        return;
    }
    fs::write(repo.join("README.md"), "hello\n").unwrap();
    assert!(git(&repo, &["add", "README.md"]));
    assert!(git(&repo, &["commit", "-q", "-m", "Add readme"]));

    let (mut config, store) = sqlite_store(&tmp).await;
    config.connectors.git = Some(GitConnectorConfig {
        repo: repo.clone(),
        rev: "HEAD".to_string(),
        max_commits: 10,
    });

    let first = extract(&config, "commits").unwrap();
    let second = extract(&config, "commits").unwrap();
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items, second.items);

    assert_eq!(ingest_batch(&store, &first).await.unwrap().inserted, 1);
    assert_eq!(ingest_batch(&store, &second).await.unwrap().inserted, 0);
    assert_eq!(store.count().await.unwrap(), 1);

    let matches = retrieve(&store, "readme", 1).await.unwrap();
    assert_eq!(matches[0].metadata.get("kind").map(String::as_str), Some("commit"));
}
