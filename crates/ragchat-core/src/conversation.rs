//! Turn-ordered conversation accumulator.
//!
//! A [`Conversation`] owns the log of one session. Each exchange moves
//! through four states:
//!
//! ```text
//! Idle ──begin_query──▶ AwaitingContext ──attach_context──▶ AwaitingModel
//!  ▲                          │ (no matches)                     │
//!  │◀─────────────────────────┘                            record_reply
//!  │                                                             │
//!  └──────────────────────────── Ready ◀─────────────────────────┘
//! ```
//!
//! Context and user turns are staged until the reply arrives, then the
//! whole exchange is committed at once. The committed log therefore never
//! holds a user turn without its assistant turn, and [`Conversation::abandon`]
//! never has to truncate anything.

use std::fmt;

use tracing::debug;

use crate::error::{RagError, Result};
use crate::models::{Match, Role, Turn};
use crate::normalize::render_context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AwaitingContext,
    AwaitingModel,
    /// The reply has been recorded. Transient: [`Conversation::record_reply`]
    /// returns to `Idle` before handing control back.
    Ready,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationState::Idle => "idle",
            ConversationState::AwaitingContext => "awaiting-context",
            ConversationState::AwaitingModel => "awaiting-model",
            ConversationState::Ready => "ready",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    state: ConversationState,
    committed: Vec<Turn>,
    staged: Vec<Turn>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            state: ConversationState::Idle,
            committed: Vec::new(),
            staged: Vec::new(),
        }
    }

    /// A conversation whose log opens with one system turn.
    pub fn with_preamble(preamble: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.committed.push(Turn::system(preamble));
        conv
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// The committed log. Staged turns of an in-flight exchange are not
    /// included.
    pub fn turns(&self) -> &[Turn] {
        &self.committed
    }

    pub fn begin_query(&mut self) -> Result<()> {
        self.require_state(ConversationState::Idle)?;
        self.state = ConversationState::AwaitingContext;
        Ok(())
    }

    /// Stage one context turn per match, best first, followed by the user
    /// turn. Returns the number of context turns staged.
    ///
    /// With no matches nothing is staged, the conversation returns to
    /// `Idle`, and the call fails with [`RagError::NoRelevantData`].
    pub fn attach_context(&mut self, query: &str, matches: &[Match]) -> Result<usize> {
        self.require_state(ConversationState::AwaitingContext)?;

        if matches.is_empty() {
            self.state = ConversationState::Idle;
            return Err(RagError::NoRelevantData);
        }

        let mut ordered: Vec<&Match> = matches.iter().collect();
        ordered.sort_by_key(|m| m.rank);

        self.staged.clear();
        for m in &ordered {
            self.staged.push(Turn::context(render_context(m)));
        }
        self.staged.push(Turn::user(query));
        self.state = ConversationState::AwaitingModel;

        debug!(context_turns = ordered.len(), "staged exchange");
        Ok(ordered.len())
    }

    /// Full history for the next model call: committed turns then the
    /// staged exchange.
    pub fn prompt(&self) -> Vec<Turn> {
        self.committed
            .iter()
            .chain(self.staged.iter())
            .cloned()
            .collect()
    }

    /// Commit the staged exchange with the assistant's reply and return the
    /// full transcript.
    pub fn record_reply(&mut self, reply: impl Into<String>) -> Result<Vec<Turn>> {
        self.require_state(ConversationState::AwaitingModel)?;

        self.committed.append(&mut self.staged);
        self.committed.push(Turn::assistant(reply));
        self.state = ConversationState::Ready;

        let transcript = self.committed.clone();
        self.state = ConversationState::Idle;
        Ok(transcript)
    }

    /// Drop the in-flight exchange, if any, and return to `Idle`.
    pub fn abandon(&mut self) {
        if !self.staged.is_empty() {
            debug!(dropped = self.staged.len(), "abandoned exchange");
        }
        self.staged.clear();
        self.state = ConversationState::Idle;
    }

    /// Number of committed user turns.
    pub fn exchanges(&self) -> usize {
        self.committed
            .iter()
            .filter(|t| t.role == Role::User)
            .count()
    }

    fn require_state(&self, expected: ConversationState) -> Result<()> {
        if self.state != expected {
            return Err(RagError::InvalidState {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }
}
