//! Chunk-level KNN over the knowledge base.
//!
//! Query text is embedded with the same [`Embedder`] that indexed the
//! documents, then compared against `chunks.embedding_json` for documents
//! in the requested category. When `sqlite-vec` is registered the distance
//! is computed inside SQLite; otherwise rows are scored in process.

use super::embed::Embedder;
use crate::overlap::normalize;
use crate::retrieval::{RetrievalHit, Retriever, VectorLookup};
use anyhow::{Context, Result};
use dupscan_core::DupError;
use dupscan_core::db::store;
use dupscan_core::model::EmbeddingVector;
use rusqlite::{Connection, params};
use std::cmp::Ordering;
use tracing::debug;

/// Read-only retrieval handle over an open knowledge base.
pub struct SqliteIndex<'a> {
    conn: &'a Connection,
    embedder: &'a dyn Embedder,
}

impl<'a> SqliteIndex<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection, embedder: &'a dyn Embedder) -> Self {
        Self { conn, embedder }
    }

    /// Top `k` chunks of `category` by cosine similarity to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`DupError::DimensionMismatch`] if `query` does not match the
    /// stored vectors, or a storage error.
    pub fn knn(&self, query: &[f32], k: usize, category: &str) -> Result<Vec<RetrievalHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        if let Some(stored) = store::stored_dimension(self.conn)?
            && stored != query.len()
        {
            return Err(DupError::DimensionMismatch {
                expected: stored,
                actual: query.len(),
            }
            .into());
        }
        let Some(query) = normalize(query) else {
            debug!("query embedding has zero norm, no neighbors");
            return Ok(Vec::new());
        };

        if let Some(hits) = self.try_knn_sqlite_vec(&query, k, category)? {
            return Ok(hits);
        }

        let mut hits = Vec::new();
        for row in store::category_chunk_rows(self.conn, category)? {
            if row.embedding.len() != query.len() {
                debug!(
                    doc_id = %row.doc_id,
                    chunk_index = row.chunk_index,
                    "skipping chunk with dimension {}",
                    row.embedding.len()
                );
                continue;
            }
            let Some(stored) = normalize(&row.embedding) else {
                continue;
            };
            let cosine: f32 = query.iter().zip(&stored).map(|(a, b)| a * b).sum();
            hits.push(RetrievalHit {
                doc_id: row.doc_id,
                score: cosine.clamp(0.0, 1.0),
                chunk_index: row.chunk_index,
            });
        }

        sort_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    fn try_knn_sqlite_vec(
        &self,
        query: &[f32],
        k: usize,
        category: &str,
    ) -> Result<Option<Vec<RetrievalHit>>> {
        if !dupscan_sqlite_vec::is_available(self.conn) {
            return Ok(None);
        }

        let query_json = store::encode_embedding_json(query);
        let mut stmt = match self.conn.prepare(
            "SELECT c.doc_id, c.chunk_index,
                    vec_distance_cosine(vec_f32(c.embedding_json), vec_f32(?1)) AS distance
             FROM chunks c
             JOIN documents d ON d.doc_id = c.doc_id
             WHERE d.category = ?2
             ORDER BY distance ASC, c.doc_id ASC, c.chunk_index ASC
             LIMIT ?3",
        ) {
            Ok(stmt) => stmt,
            Err(err) => {
                debug!("sqlite-vec KNN unavailable, falling back to in-process scoring: {err}");
                return Ok(None);
            }
        };

        let limit = i64::try_from(k).unwrap_or(i64::MAX);
        let rows = match stmt.query_map(params![query_json, category, limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        }) {
            Ok(rows) => rows,
            Err(err) => {
                debug!("sqlite-vec KNN query failed, falling back to in-process scoring: {err}");
                return Ok(None);
            }
        };

        let mut hits = Vec::new();
        for row in rows {
            let (doc_id, chunk_index, distance) = match row {
                Ok(row) => row,
                Err(err) => {
                    debug!("sqlite-vec KNN row failed, falling back to in-process scoring: {err}");
                    return Ok(None);
                }
            };
            let Ok(chunk_index) = usize::try_from(chunk_index) else {
                continue;
            };
            #[allow(clippy::cast_possible_truncation)]
            let score = (1.0 - distance as f32).clamp(0.0, 1.0);
            hits.push(RetrievalHit {
                doc_id,
                score,
                chunk_index,
            });
        }

        sort_hits(&mut hits);
        Ok(Some(hits))
    }
}

impl std::fmt::Debug for SqliteIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteIndex")
            .field("dimension", &self.embedder.dimension())
            .finish_non_exhaustive()
    }
}

impl Retriever for SqliteIndex<'_> {
    fn query(&self, text: &str, k: usize, category: &str) -> Result<Vec<RetrievalHit>> {
        let embedding = self
            .embedder
            .embed(text)
            .context("failed to embed retrieval query")?;
        self.knn(&embedding, k, category)
    }
}

impl VectorLookup for SqliteIndex<'_> {
    fn vectors_for(&self, doc_id: &str) -> Result<Vec<EmbeddingVector>> {
        store::chunk_vectors(self.conn, doc_id)
    }
}

fn sort_hits(hits: &mut [RetrievalHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.doc_id.cmp(&b.doc_id))
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::embed::HashingEmbedder;
    use dupscan_core::db::open_in_memory;
    use dupscan_core::model::{ContentType, EmbeddedChunk, NewDocument};

    fn insert(conn: &Connection, category: &str, vectors: &[&[f32]]) -> String {
        let chunks: Vec<EmbeddedChunk> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| EmbeddedChunk {
                content: format!("chunk {i}"),
                embedding: v.to_vec(),
            })
            .collect();
        store::insert_document(
            conn,
            &NewDocument {
                category: category.to_string(),
                content_type: ContentType::Text,
                tags: Vec::new(),
            },
            &chunks,
        )
        .expect("insert document")
    }

    #[test]
    fn knn_ranks_by_cosine_and_filters_category() {
        let conn = open_in_memory().expect("db");
        let embedder = HashingEmbedder::new(3).expect("embedder");
        let near = insert(&conn, "kb", &[&[1.0, 0.1, 0.0], &[0.0, 0.0, 1.0]]);
        let far = insert(&conn, "kb", &[&[0.0, 1.0, 0.0]]);
        insert(&conn, "other", &[&[1.0, 0.0, 0.0]]);

        let index = SqliteIndex::new(&conn, &embedder);
        let hits = index.knn(&[1.0, 0.0, 0.0], 10, "kb").expect("knn");

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].doc_id, near);
        assert_eq!(hits[0].chunk_index, 0);
        assert!(hits[0].score > 0.9);
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
        assert!(hits.iter().any(|h| h.doc_id == far));
    }

    #[test]
    fn knn_truncates_to_k() {
        let conn = open_in_memory().expect("db");
        let embedder = HashingEmbedder::new(2).expect("embedder");
        insert(&conn, "kb", &[&[1.0, 0.0], &[0.7, 0.7], &[0.0, 1.0]]);

        let index = SqliteIndex::new(&conn, &embedder);
        assert_eq!(index.knn(&[1.0, 0.0], 2, "kb").expect("knn").len(), 2);
        assert!(index.knn(&[1.0, 0.0], 0, "kb").expect("knn").is_empty());
    }

    #[test]
    fn knn_on_empty_store_is_empty() {
        let conn = open_in_memory().expect("db");
        let embedder = HashingEmbedder::new(2).expect("embedder");
        let index = SqliteIndex::new(&conn, &embedder);
        assert!(index.query("anything", 5, "kb").expect("query").is_empty());
    }

    #[test]
    fn knn_rejects_wrong_query_dimension() {
        let conn = open_in_memory().expect("db");
        let embedder = HashingEmbedder::new(2).expect("embedder");
        insert(&conn, "kb", &[&[1.0, 0.0]]);

        let index = SqliteIndex::new(&conn, &embedder);
        let err = index.knn(&[1.0, 0.0, 0.0], 3, "kb").expect_err("mismatch");
        assert_eq!(
            err.downcast_ref::<DupError>(),
            Some(&DupError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn vectors_for_returns_stored_chunks() {
        let conn = open_in_memory().expect("db");
        let embedder = HashingEmbedder::new(2).expect("embedder");
        let id = insert(&conn, "kb", &[&[1.0, 0.0], &[0.0, 1.0]]);

        let index = SqliteIndex::new(&conn, &embedder);
        assert_eq!(
            index.vectors_for(&id).expect("lookup"),
            vec![vec![1.0, 0.0], vec![0.0, 1.0]]
        );
        assert!(index.vectors_for("missing").expect("lookup").is_empty());
    }

    #[test]
    fn sqlite_vec_and_fallback_agree() {
        dupscan_sqlite_vec::register_auto_extension().expect("sqlite-vec registers");
        let conn = open_in_memory().expect("db");
        assert!(dupscan_sqlite_vec::is_available(&conn));
        let embedder = HashingEmbedder::new(3).expect("embedder");
        insert(&conn, "kb", &[&[1.0, 0.0, 0.0], &[0.6, 0.8, 0.0]]);
        insert(&conn, "kb", &[&[0.0, 0.0, 1.0]]);

        let index = SqliteIndex::new(&conn, &embedder);
        let query = [0.8, 0.6, 0.0];
        let normalized = normalize(&query).expect("non-zero query");

        let via_index = index.knn(&query, 3, "kb").expect("knn");
        let in_process = {
            let mut rows: Vec<RetrievalHit> = store::category_chunk_rows(&conn, "kb")
                .expect("rows")
                .into_iter()
                .map(|row| {
                    let stored = normalize(&row.embedding).expect("non-zero row");
                    let cos: f32 = normalized.iter().zip(&stored).map(|(a, b)| a * b).sum();
                    RetrievalHit {
                        doc_id: row.doc_id,
                        score: cos.clamp(0.0, 1.0),
                        chunk_index: row.chunk_index,
                    }
                })
                .collect();
            sort_hits(&mut rows);
            rows
        };

        assert_eq!(via_index.len(), in_process.len());
        for (a, b) in via_index.iter().zip(&in_process) {
            assert_eq!((&a.doc_id, a.chunk_index), (&b.doc_id, b.chunk_index));
            assert!((a.score - b.score).abs() < 1e-4);
        }
    }
}
