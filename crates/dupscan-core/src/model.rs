//! Shared data model for documents, chunks and embeddings.

use crate::error::DupError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fixed-dimension embedding. All vectors compared together must share
/// the same length.
pub type EmbeddingVector = Vec<f32>;

/// How submitted content is split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Plain prose; one chunk per blank-line separated paragraph.
    Text,
    /// CommonMark; one chunk per top-level block, markup preserved.
    Markdown,
    /// Source code; overlapping token windows.
    Code,
}

impl ContentType {
    /// Canonical lowercase name, as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = DupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" | "plain" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            "code" => Ok(Self::Code),
            _ => Err(DupError::UnsupportedContentType(s.to_string())),
        }
    }
}

/// A document about to be written to the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub category: String,
    pub content_type: ContentType,
    pub tags: Vec<String>,
}

/// One chunk of a new document together with its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub content: String,
    pub embedding: EmbeddingVector,
}

/// A stored document as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    /// Document id (millisecond timestamp string).
    pub id: String,
    /// Chunks rejoined in order with blank lines.
    pub content: String,
    pub category: String,
    pub content_type: String,
    pub tags: Vec<String>,
    pub chunk_count: usize,
    pub created_at_us: i64,
}

/// A stored chunk row used for in-process nearest-neighbor scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub doc_id: String,
    pub chunk_index: usize,
    pub embedding: EmbeddingVector,
}
