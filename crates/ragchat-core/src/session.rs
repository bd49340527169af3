//! One interactive question/answer session.
//!
//! A [`Session`] wires a shared store and chat model to its own
//! [`Conversation`]. `submit_query` takes `&mut self`, so exchanges on one
//! session are strictly sequential; independent sessions may share the same
//! `Arc<dyn Store>`.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::error::{RagError, Result};
use crate::model::ChatModel;
use crate::models::{Match, Turn};
use crate::retrieve::retrieve_relevant;
use crate::store::Store;

/// Result of one answered query.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Number of context turns injected ahead of the query.
    pub context_count: usize,
    pub matches: Vec<Match>,
    pub reply: String,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Answered(Exchange),
    /// The user submitted a blank line. The session accepts no further
    /// queries.
    Ended,
}

pub struct Session {
    id: String,
    store: Arc<dyn Store>,
    model: Arc<dyn ChatModel>,
    conversation: Conversation,
    top_k: usize,
    ended: bool,
}

impl Session {
    pub fn new(store: Arc<dyn Store>, model: Arc<dyn ChatModel>, top_k: usize) -> Self {
        Self::with_conversation(store, model, top_k, Conversation::new())
    }

    pub fn with_conversation(
        store: Arc<dyn Store>,
        model: Arc<dyn ChatModel>,
        top_k: usize,
        conversation: Conversation,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            store,
            model,
            conversation,
            top_k,
            ended: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// The committed conversation log.
    pub fn transcript(&self) -> &[Turn] {
        self.conversation.turns()
    }

    /// Answer one query.
    ///
    /// Blank input ends the session without touching the store. Errors
    /// leave the committed log as it was and the session usable.
    pub async fn submit_query(&mut self, text: &str) -> Result<SessionEvent> {
        if self.ended || text.trim().is_empty() {
            if !self.ended {
                info!(session = %self.id, exchanges = self.conversation.exchanges(), "session ended");
            }
            self.ended = true;
            return Ok(SessionEvent::Ended);
        }

        self.conversation.begin_query()?;

        let matches = match retrieve_relevant(self.store.as_ref(), text, self.top_k).await {
            Ok(m) => m,
            Err(err) => {
                self.conversation.abandon();
                match &err {
                    RagError::NoRelevantData => {
                        info!(session = %self.id, query = text, "no relevant data for query")
                    }
                    _ => warn!(session = %self.id, error = %err, "retrieval failed"),
                }
                return Err(err);
            }
        };

        let context_count = self.conversation.attach_context(text, &matches)?;
        let prompt = self.conversation.prompt();

        debug!(
            session = %self.id,
            model = self.model.name(),
            turns = prompt.len(),
            context_count,
            "calling chat model"
        );

        let reply = match self.model.complete(&prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                self.conversation.abandon();
                warn!(session = %self.id, error = %err, "model call failed");
                return Err(err);
            }
        };

        self.conversation.record_reply(reply.clone())?;

        Ok(SessionEvent::Answered(Exchange {
            context_count,
            matches,
            reply,
        }))
    }
}
