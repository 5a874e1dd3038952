//! Embedding backends and the SQLite-backed chunk index.

mod embed;
mod index;
mod ingest;

pub use embed::{Embedder, HashingEmbedder, HttpEmbedder, embedder_from_config};
pub use index::SqliteIndex;
pub use ingest::IngestPipeline;
