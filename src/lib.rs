//! # ragchat
//!
//! A retrieval-augmented question-answering assistant. Curated knowledge
//! (a built-in GitHub FAQ, local documents, git history) is ingested into a
//! SQLite full-text store; each question retrieves the closest records and
//! hands them to a chat model as context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌───────────────┐
//! │  Connectors  │──▶│  normalize  │──▶│ SQLite + FTS5 │
//! │ FAQ/Docs/Git │   │  + ingest   │   │ (SqliteStore) │
//! └──────────────┘   └─────────────┘   └───────┬───────┘
//!                                              │ retrieve
//!                                              ▼
//!                   ┌─────────┐          ┌───────────┐
//!                   │ Ollama  │◀─prompt──│  Session  │◀── chat / ask
//!                   └─────────┘──reply──▶└───────────┘
//! ```
//!
//! Backend-agnostic logic (records, ingestion, retrieval, the conversation
//! state machine) lives in `ragchat-core`. This crate supplies the
//! concrete store, connectors, model client, and CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite/FTS5 [`Store`](ragchat_core::store::Store) |
//! | [`faq`] | Built-in and file-based FAQ connector |
//! | [`connector_fs`] | Local documents connector |
//! | [`connector_git`] | Git history connector |
//! | [`extract`] | Text extraction for PDF and OOXML files |
//! | [`ingest`] | Connector → store pipeline |
//! | [`ollama`] | Chat model clients |
//! | [`chat`] | Interactive loop and one-shot questions |
//! | [`search`] | Retrieval without a model call |
//! | [`stats`] | Store statistics |
//! | [`logging`] | Diagnostic log setup |

pub mod chat;
pub mod config;
pub mod connector_fs;
pub mod connector_git;
pub mod db;
pub mod extract;
pub mod faq;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod ollama;
pub mod search;
pub mod sqlite_store;
pub mod stats;
