//! Chunk, embed and store new documents.

use super::embed::Embedder;
use crate::overlap::normalize;
use anyhow::{Context, Result, bail};
use dupscan_core::DupError;
use dupscan_core::chunk::Chunker;
use dupscan_core::db::store;
use dupscan_core::model::{ContentType, EmbeddedChunk, NewDocument};
use rusqlite::Connection;
use tracing::{info, warn};

/// Writes documents into the knowledge base.
///
/// A document is stored whole or not at all: any embedding failure aborts
/// the insert.
pub struct IngestPipeline<'a> {
    conn: &'a Connection,
    chunker: &'a dyn Chunker,
    embedder: &'a dyn Embedder,
}

impl<'a> IngestPipeline<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection, chunker: &'a dyn Chunker, embedder: &'a dyn Embedder) -> Self {
        Self {
            conn,
            chunker,
            embedder,
        }
    }

    /// Chunk, embed and store `content`. Returns the new document id.
    ///
    /// Chunks whose embedding has zero norm (no words to hash, for example
    /// a thematic break) are not indexed.
    ///
    /// # Errors
    ///
    /// Returns [`DupError::EmptyContent`] if nothing indexable remains, an
    /// embedding error, or a storage error.
    pub fn add(
        &self,
        content: &str,
        category: &str,
        content_type: ContentType,
        tags: &[String],
    ) -> Result<String> {
        let chunks = self.chunker.split(content, content_type);
        if chunks.is_empty() {
            return Err(DupError::EmptyContent.into());
        }

        let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .context("failed to embed document chunks")?;
        if embeddings.len() != chunks.len() {
            bail!(
                "embedding batch length mismatch: expected {}, got {}",
                chunks.len(),
                embeddings.len()
            );
        }

        let mut embedded = Vec::with_capacity(chunks.len());
        for (position, (content, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            if normalize(&embedding).is_none() {
                warn!(position, "chunk embedding has zero norm, not indexed");
                continue;
            }
            embedded.push(EmbeddedChunk { content, embedding });
        }
        if embedded.is_empty() {
            return Err(DupError::EmptyContent.into());
        }

        let doc = NewDocument {
            category: category.to_string(),
            content_type,
            tags: tags.to_vec(),
        };
        let doc_id = store::insert_document(self.conn, &doc, &embedded)?;
        info!(doc_id = %doc_id, category, content_type = %content_type, "ingested document");
        Ok(doc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::embed::HashingEmbedder;
    use anyhow::anyhow;
    use dupscan_core::chunk::DefaultChunker;
    use dupscan_core::db::open_in_memory;
    use dupscan_core::model::EmbeddingVector;

    struct Broken;

    impl Embedder for Broken {
        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str) -> Result<EmbeddingVector> {
            Err(anyhow!("embedding service offline"))
        }
    }

    #[test]
    fn add_stores_one_row_per_chunk() -> Result<()> {
        let conn = open_in_memory()?;
        let chunker = DefaultChunker::default();
        let embedder = HashingEmbedder::new(32)?;
        let pipeline = IngestPipeline::new(&conn, &chunker, &embedder);

        let id = pipeline.add(
            "# Title\n\nFirst paragraph.\n\nSecond paragraph.",
            "docs",
            ContentType::Markdown,
            &["guide".to_string()],
        )?;

        let vectors = store::chunk_vectors(&conn, &id)?;
        assert_eq!(vectors.len(), 3);
        let docs = store::list_documents(&conn, Some("docs"))?;
        assert_eq!(docs[0].tags, vec!["guide"]);
        assert_eq!(docs[0].content_type, "markdown");
        Ok(())
    }

    #[test]
    fn blank_content_is_rejected() -> Result<()> {
        let conn = open_in_memory()?;
        let chunker = DefaultChunker::default();
        let embedder = HashingEmbedder::new(8)?;
        let pipeline = IngestPipeline::new(&conn, &chunker, &embedder);

        let err = pipeline
            .add("   \n\n  ", "docs", ContentType::Text, &[])
            .expect_err("blank content");
        assert_eq!(err.downcast_ref::<DupError>(), Some(&DupError::EmptyContent));
        Ok(())
    }

    #[test]
    fn wordless_chunks_are_skipped() -> Result<()> {
        let conn = open_in_memory()?;
        let chunker = DefaultChunker::default();
        let embedder = HashingEmbedder::new(8)?;
        let pipeline = IngestPipeline::new(&conn, &chunker, &embedder);

        let id = pipeline.add("intro\n\n---\n\noutro", "docs", ContentType::Markdown, &[])?;
        assert_eq!(store::chunk_vectors(&conn, &id)?.len(), 2);

        let err = pipeline
            .add("---", "docs", ContentType::Markdown, &[])
            .expect_err("nothing indexable");
        assert_eq!(err.downcast_ref::<DupError>(), Some(&DupError::EmptyContent));
        Ok(())
    }

    #[test]
    fn embedding_failure_stores_nothing() -> Result<()> {
        let conn = open_in_memory()?;
        let chunker = DefaultChunker::default();
        let pipeline = IngestPipeline::new(&conn, &chunker, &Broken);

        assert!(pipeline.add("some text", "docs", ContentType::Text, &[]).is_err());
        assert!(store::list_documents(&conn, None)?.is_empty());
        Ok(())
    }
}
