use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    UnsupportedContentType,
    InvalidParameter,
    DimensionMismatch,
    DegenerateVector,
    DocumentNotFound,
    EmptyDocument,
    EmbeddingUnavailable,
    StoreUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::UnsupportedContentType => "E2001",
            Self::InvalidParameter => "E2002",
            Self::DimensionMismatch => "E2003",
            Self::DegenerateVector => "E2004",
            Self::DocumentNotFound => "E3001",
            Self::EmptyDocument => "E3002",
            Self::EmbeddingUnavailable => "E6001",
            Self::StoreUnavailable => "E6002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Knowledge base not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::UnsupportedContentType => "Unsupported content type",
            Self::InvalidParameter => "Invalid tuning parameter",
            Self::DimensionMismatch => "Embedding dimension mismatch",
            Self::DegenerateVector => "Degenerate embedding vector",
            Self::DocumentNotFound => "Document not found",
            Self::EmptyDocument => "Document produced no chunks",
            Self::EmbeddingUnavailable => "Embedding service unavailable",
            Self::StoreUnavailable => "Knowledge base store unavailable",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `dupscan init` to create .dupscan/."),
            Self::ConfigParseError => Some("Fix syntax in .dupscan/config.toml and retry."),
            Self::UnsupportedContentType => Some("Use one of: text, markdown, code."),
            Self::InvalidParameter => Some("top_docs, top_nchunk and top_k must all be >= 1."),
            Self::DimensionMismatch => Some(
                "Re-index the knowledge base with the embedding model configured for search.",
            ),
            Self::DegenerateVector => None,
            Self::DocumentNotFound => Some("Use `dupscan list` to see stored documents."),
            Self::EmptyDocument => Some("Provide non-blank content."),
            Self::EmbeddingUnavailable => {
                Some("Check [embedding] in .dupscan/config.toml and the API key variable.")
            }
            Self::StoreUnavailable => Some("Check that .dupscan/kb.sqlite3 is readable."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Request-level validation failures.
///
/// These reject a request before any retrieval work happens. Collaborator
/// failures (embedding, retrieval, vector lookup) are not represented here:
/// the search pipeline absorbs them and reports degraded scores instead.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DupError {
    /// Content type string is not one the chunker understands.
    #[error("unsupported content type '{0}' (expected text, markdown or code)")]
    UnsupportedContentType(String),

    /// A tuning parameter that must be positive was zero.
    #[error("tuning parameter `{name}` must be a positive integer")]
    NonPositiveParameter { name: &'static str },

    /// Two vectors that must be compared have different lengths.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// One side of an overlap comparison had no vectors.
    #[error("{0} vector set is empty")]
    EmptyVectorSet(&'static str),

    /// A vector with zero Euclidean norm cannot be normalized.
    #[error("{set} vector at index {index} has zero norm")]
    ZeroNormVector { set: &'static str, index: usize },

    /// Chunk position outside `[0, total)` or `total == 0`.
    #[error("chunk position {pos} is out of range for {total} chunks")]
    InvalidChunkPosition { pos: usize, total: usize },

    /// Content produced no chunks where at least one is required.
    #[error("content produced no chunks")]
    EmptyContent,
}

impl DupError {
    /// The machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedContentType(_) => ErrorCode::UnsupportedContentType,
            Self::NonPositiveParameter { .. } | Self::InvalidChunkPosition { .. } => {
                ErrorCode::InvalidParameter
            }
            Self::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            Self::EmptyVectorSet(_) | Self::ZeroNormVector { .. } => ErrorCode::DegenerateVector,
            Self::EmptyContent => ErrorCode::EmptyDocument,
        }
    }
}
