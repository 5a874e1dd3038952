//! Canonical SQLite schema for the knowledge base.
//!
//! - `documents` holds one row per ingested document with its category
//!   (the retrieval filter), content type and tags
//! - `chunks` holds the ordered chunks of each document with their
//!   embedding, encoded as a JSON float array so both the `sqlite-vec`
//!   path (`vec_f32(embedding_json)`) and the in-process path can read it

/// Migration v1: documents and chunks.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    doc_id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    content_type TEXT NOT NULL CHECK (content_type IN ('text', 'markdown', 'code')),
    tags_json TEXT NOT NULL DEFAULT '[]',
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    doc_id TEXT NOT NULL REFERENCES documents(doc_id) ON DELETE CASCADE,
    chunk_index INTEGER NOT NULL CHECK (chunk_index >= 0),
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    embedding_json TEXT NOT NULL,
    PRIMARY KEY (doc_id, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_documents_category
    ON documents(category);

CREATE INDEX IF NOT EXISTS idx_chunks_content_hash
    ON chunks(content_hash);
";

/// Indexes every migrated database must have.
pub const REQUIRED_INDEXES: &[&str] = &["idx_documents_category", "idx_chunks_content_hash"];
