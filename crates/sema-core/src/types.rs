//! Record types shared across the semantic engine crates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SemaError};

/// Free-form document metadata.
pub type Metadata = Map<String, Value>;

/// A text document stored alongside its vector in the index.
///
/// `id` is caller-supplied and purely informational: it is neither unique
/// nor used as a lookup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl Document {
    /// Create a document without metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: None,
        }
    }

    /// Attach metadata to the document.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Reject documents that cannot be embedded.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(SemaError::InvalidDocument(format!(
                "document '{}' has empty text",
                self.id
            )));
        }
        Ok(())
    }

    /// Build a document from an untyped JSON value, validating its shape.
    ///
    /// The value must be an object with a string `text`. `id` may be a string
    /// or a number and defaults to `default_id`. `metadata` may be absent,
    /// null, or an object.
    pub fn from_json(value: Value, default_id: &str) -> Result<Self> {
        let Value::Object(mut obj) = value else {
            return Err(SemaError::InvalidDocument(
                "document must be a JSON object".to_string(),
            ));
        };

        let text = match obj.remove("text") {
            Some(Value::String(text)) => text,
            Some(_) => {
                return Err(SemaError::InvalidDocument(
                    "field 'text' must be a string".to_string(),
                ))
            }
            None => {
                return Err(SemaError::InvalidDocument(
                    "missing field 'text'".to_string(),
                ))
            }
        };

        let id = match obj.remove("id") {
            None | Some(Value::Null) => default_id.to_string(),
            Some(Value::String(id)) => id,
            Some(Value::Number(n)) => n.to_string(),
            Some(_) => {
                return Err(SemaError::InvalidDocument(
                    "field 'id' must be a string or a number".to_string(),
                ))
            }
        };

        let metadata = match obj.remove("metadata") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                return Err(SemaError::InvalidDocument(format!(
                    "document '{}': field 'metadata' must be an object",
                    id
                )))
            }
        };

        let doc = Document { id, text, metadata };
        doc.validate()?;
        Ok(doc)
    }
}

/// A document returned by retrieval, scored by its raw distance to the query.
///
/// Lower scores are more similar; the score is not normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub text: String,
    pub metadata: Option<Metadata>,
    pub score: f32,
}

impl RetrievedDocument {
    pub fn from_hit(doc: Document, score: f32) -> Self {
        Self {
            id: doc.id,
            text: doc.text,
            metadata: doc.metadata,
            score,
        }
    }
}
