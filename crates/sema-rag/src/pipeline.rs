//! Query answering: retrieve, build a prompt, complete.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sema_core::types::RetrievedDocument;
use sema_index::Retriever;

use crate::completer::TextCompleter;
use crate::error::{RagError, Result};
use crate::prompt::build_prompt;

/// Answer text together with the documents it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    pub answer: String,
    pub retrieved: Vec<RetrievedDocument>,
}

/// Composes a [`Retriever`] with a [`TextCompleter`].
pub struct RagPipeline {
    retriever: Arc<Retriever>,
    completer: Arc<dyn TextCompleter>,
}

impl RagPipeline {
    pub fn new(retriever: Arc<Retriever>, completer: Arc<dyn TextCompleter>) -> Self {
        Self {
            retriever,
            completer,
        }
    }

    /// Answer `query` from its `top_k` nearest documents.
    pub async fn answer(&self, query: &str, top_k: usize) -> Result<RagAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuery);
        }
        let start = Instant::now();

        let retrieved = self.retriever.retrieve(query, top_k).await?;
        let prompt = build_prompt(query, &retrieved);
        info!(
            retrieved = retrieved.len(),
            prompt_chars = prompt.len(),
            completer = self.completer.name(),
            "Prompt built"
        );

        let answer = self.completer.complete(&prompt).await?;
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "Query answered");
        Ok(RagAnswer { answer, retrieved })
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    pub fn completer(&self) -> &Arc<dyn TextCompleter> {
        &self.completer
    }
}
