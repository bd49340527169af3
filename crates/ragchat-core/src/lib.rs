//! # ragchat core
//!
//! Backend-agnostic logic for ragchat: data models, record normalization,
//! document chunking, the store abstraction, idempotent ingestion, retrieval,
//! and the conversation accumulator that feeds a chat model.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Concrete
//! stores, extractors, and model clients live in the `ragchat` app crate and
//! plug in through [`store::Store`] and [`model::ChatModel`].
//!
//! ## Data Flow
//!
//! ```text
//! SourceItem ──normalize──▶ Record ──ingest──▶ Store
//!                                               │
//!            query ──retrieve──▶ Vec<Match> ◀───┘
//!                                   │
//!                                   ▼
//!                            Conversation ──prompt──▶ ChatModel
//!                                   ▲                     │
//!                                   └────record_reply─────┘
//! ```

pub mod chunk;
pub mod conversation;
pub mod error;
pub mod ingest;
pub mod model;
pub mod models;
pub mod normalize;
pub mod retrieve;
pub mod session;
pub mod store;

pub use error::{RagError, Result};
