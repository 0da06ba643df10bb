//! Retrieval-augmented answering on top of the vector index.

pub mod completer;
pub mod error;
pub mod pipeline;
pub mod prompt;

pub use completer::{build_completer, OpenAiCompleter, TextCompleter, UnconfiguredCompleter};
pub use error::{RagError, Result};
pub use pipeline::{RagAnswer, RagPipeline};
pub use prompt::build_prompt;
