//! Interactive question/answer loop and one-shot `ask`.
//!
//! The loop reads one query per line. A blank line (or end of input) ends
//! the session. Queries with no relevant records print an error and the
//! loop carries on; so do store and model failures, since the session
//! stays usable after them.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;

use ragchat_core::conversation::Conversation;
use ragchat_core::session::{Session, SessionEvent};
use ragchat_core::RagError;

use crate::config::Config;
use crate::ollama::create_model;
use crate::sqlite_store::SqliteStore;

pub const PROMPT: &str = "=> Ask Me: ";
pub const GOODBYE: &str = "Goodbye!";
pub const NO_DATA: &str = "* Error: No relevant information in the database. *";

/// Open the configured store and model and start a session.
pub async fn open_session(config: &Config) -> Result<Session> {
    let store = Arc::new(SqliteStore::open(config).await?);
    let model = create_model(&config.model)?;

    let conversation = if config.session.system_prompt.trim().is_empty() {
        Conversation::new()
    } else {
        Conversation::with_preamble(config.session.system_prompt.clone())
    };

    Ok(Session::with_conversation(
        store,
        model,
        config.retrieval.top_k,
        conversation,
    ))
}

pub async fn run_chat(config: &Config) -> Result<()> {
    let mut session = open_session(config).await?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    chat_loop(&mut session, stdin.lock(), stdout.lock()).await
}

pub async fn run_ask(config: &Config, query: &str) -> Result<()> {
    let mut session = open_session(config).await?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    answer(&mut session, query, &mut out).await?;
    Ok(())
}

/// Drive `session` from `input` until a blank line or end of input.
pub async fn chat_loop<R: BufRead, W: Write>(
    session: &mut Session,
    mut input: R,
    mut out: W,
) -> Result<()> {
    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        // Invalid UTF-8 is replaced rather than ending the session.
        let mut buf = Vec::new();
        if input.read_until(b'\n', &mut buf)? == 0 {
            // End of input ends the session like a blank line.
            buf.clear();
        }
        let line = String::from_utf8_lossy(&buf);
        let query = line.trim_end_matches(['\r', '\n']);

        if !answer(session, query, &mut out).await? {
            return Ok(());
        }
    }
}

/// Submit one query and print the outcome. Returns `false` once the
/// session has ended.
async fn answer<W: Write>(session: &mut Session, query: &str, out: &mut W) -> Result<bool> {
    match session.submit_query(query).await {
        Ok(SessionEvent::Ended) => {
            writeln!(out, "\n{}", GOODBYE)?;
            Ok(false)
        }
        Ok(SessionEvent::Answered(exchange)) => {
            writeln!(out, "\n=> Response: {} \n", exchange.reply)?;
            Ok(true)
        }
        Err(RagError::NoRelevantData) => {
            writeln!(out, "\n{}\n", NO_DATA)?;
            Ok(true)
        }
        Err(err) => {
            writeln!(out, "\n* Error: {} *\n", err)?;
            Ok(true)
        }
    }
}
