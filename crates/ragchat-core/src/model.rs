//! Chat model abstraction.
//!
//! A [`ChatModel`] turns the full ordered transcript into one reply. The
//! core never retries; clients that talk to a network service handle
//! retries and timeouts themselves and report the final failure as
//! [`RagError::ModelFailure`](crate::RagError::ModelFailure).

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Turn;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Identifier for logs, e.g. `"ollama:llama3.2"`.
    fn name(&self) -> &str;

    async fn complete(&self, turns: &[Turn]) -> Result<String>;
}
