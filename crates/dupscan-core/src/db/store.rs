//! Document and chunk persistence.
//!
//! The search pipeline only ever reads from these tables; writes happen
//! through ingestion and deletion.

use crate::error::DupError;
use crate::model::{DocumentSummary, EmbeddedChunk, EmbeddingVector, NewDocument, StoredChunk};
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Insert a document and all of its embedded chunks in one transaction.
///
/// Document ids are the current Unix time in milliseconds, bumped by one
/// until unused. Returns the new id.
///
/// # Errors
///
/// Returns [`DupError::EmptyContent`] when `chunks` is empty,
/// [`DupError::DimensionMismatch`] when the chunk embeddings disagree with
/// each other or with vectors already stored, and a storage error if the
/// write fails.
pub fn insert_document(
    conn: &Connection,
    doc: &NewDocument,
    chunks: &[EmbeddedChunk],
) -> Result<String> {
    let Some(first) = chunks.first() else {
        return Err(DupError::EmptyContent.into());
    };
    let dimension = first.embedding.len();
    for chunk in chunks {
        if chunk.embedding.len() != dimension {
            return Err(DupError::DimensionMismatch {
                expected: dimension,
                actual: chunk.embedding.len(),
            }
            .into());
        }
    }
    if let Some(stored) = stored_dimension(conn)?
        && stored != dimension
    {
        return Err(DupError::DimensionMismatch {
            expected: stored,
            actual: dimension,
        }
        .into());
    }

    let now = chrono::Utc::now();
    let tx = conn
        .unchecked_transaction()
        .context("begin document insert transaction")?;

    let mut millis = now.timestamp_millis();
    while document_exists(&tx, &millis.to_string())? {
        millis += 1;
    }
    let doc_id = millis.to_string();

    let tags_json = serde_json::to_string(&doc.tags).context("encode document tags")?;
    tx.execute(
        "INSERT INTO documents (doc_id, category, content_type, tags_json, created_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            doc_id,
            doc.category,
            doc.content_type.as_str(),
            tags_json,
            now.timestamp_micros()
        ],
    )
    .with_context(|| format!("insert document {doc_id}"))?;

    for (idx, chunk) in chunks.iter().enumerate() {
        tx.execute(
            "INSERT INTO chunks (doc_id, chunk_index, content, content_hash, embedding_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                doc_id,
                i64::try_from(idx).context("chunk index overflow")?,
                chunk.content,
                content_hash_hex(&chunk.content),
                encode_embedding_json(&chunk.embedding)
            ],
        )
        .with_context(|| format!("insert chunk {idx} of document {doc_id}"))?;
    }

    tx.commit().context("commit document insert")?;
    info!(doc_id = %doc_id, chunks = chunks.len(), category = %doc.category, "stored document");

    Ok(doc_id)
}

/// Delete documents (and, by cascade, their chunks). Unknown ids are ignored.
///
/// Returns the number of documents actually removed.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn delete_documents(conn: &Connection, ids: &[String]) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .context("begin document delete transaction")?;

    let mut deleted = 0;
    for id in ids {
        deleted += tx
            .execute("DELETE FROM documents WHERE doc_id = ?1", params![id])
            .with_context(|| format!("delete document {id}"))?;
    }

    tx.commit().context("commit document delete")?;
    info!(requested = ids.len(), deleted, "deleted documents");
    Ok(deleted)
}

/// List stored documents, optionally restricted to one category, oldest first.
///
/// # Errors
///
/// Returns an error if the query fails or a row cannot be decoded.
pub fn list_documents(conn: &Connection, category: Option<&str>) -> Result<Vec<DocumentSummary>> {
    let mut stmt = conn
        .prepare(
            "SELECT doc_id, category, content_type, tags_json, created_at_us
             FROM documents
             WHERE ?1 IS NULL OR category = ?1
             ORDER BY created_at_us ASC, doc_id ASC",
        )
        .context("prepare document listing")?;

    let rows = stmt
        .query_map(params![category], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .context("execute document listing")?;

    let mut out = Vec::new();
    for row in rows {
        let (id, category, content_type, tags_json, created_at_us) =
            row.context("read document row")?;
        let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_else(|err| {
            debug!(doc_id = %id, "ignoring malformed tags_json: {err}");
            Vec::new()
        });
        let chunks = chunk_texts(conn, &id)?;
        out.push(DocumentSummary {
            content: chunks.join("\n\n"),
            chunk_count: chunks.len(),
            id,
            category,
            content_type,
            tags,
            created_at_us,
        });
    }

    Ok(out)
}

/// Returns true if a document with this id exists.
///
/// # Errors
///
/// Returns an error if the lookup fails.
pub fn document_exists(conn: &Connection, doc_id: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM documents WHERE doc_id = ?1",
            params![doc_id],
            |_| Ok(()),
        )
        .optional()
        .with_context(|| format!("look up document {doc_id}"))?;
    Ok(found.is_some())
}

/// Content of the first stored chunk of `doc_id`, or `None` for an unknown
/// document.
///
/// # Errors
///
/// Returns an error if the lookup fails.
pub fn first_chunk_text(conn: &Connection, doc_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT content FROM chunks WHERE doc_id = ?1 ORDER BY chunk_index ASC LIMIT 1",
        params![doc_id],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .with_context(|| format!("look up first chunk of {doc_id}"))
}

/// Every stored embedding belonging to `doc_id`, in chunk order.
///
/// Rows whose embedding cannot be decoded are skipped. An unknown document
/// yields an empty list.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn chunk_vectors(conn: &Connection, doc_id: &str) -> Result<Vec<EmbeddingVector>> {
    let mut stmt = conn
        .prepare(
            "SELECT chunk_index, embedding_json FROM chunks
             WHERE doc_id = ?1
             ORDER BY chunk_index ASC",
        )
        .context("prepare chunk vector lookup")?;

    let rows = stmt
        .query_map(params![doc_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })
        .with_context(|| format!("execute chunk vector lookup for {doc_id}"))?;

    let mut out = Vec::new();
    for row in rows {
        let (chunk_index, embedding_json) = row.context("read chunk vector row")?;
        match decode_embedding_json(&embedding_json) {
            Some(vector) => out.push(vector),
            None => debug!(doc_id, chunk_index, "skipping malformed embedding row"),
        }
    }

    Ok(out)
}

/// All chunk embeddings of documents in `category`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn category_chunk_rows(conn: &Connection, category: &str) -> Result<Vec<StoredChunk>> {
    let mut stmt = conn
        .prepare(
            "SELECT c.doc_id, c.chunk_index, c.embedding_json
             FROM chunks c
             JOIN documents d ON d.doc_id = c.doc_id
             WHERE d.category = ?1",
        )
        .context("prepare category chunk scan")?;

    let rows = stmt
        .query_map(params![category], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .context("execute category chunk scan")?;

    let mut out = Vec::new();
    for row in rows {
        let (doc_id, chunk_index, embedding_json) = row.context("read category chunk row")?;
        let Some(embedding) = decode_embedding_json(&embedding_json) else {
            debug!(doc_id = %doc_id, chunk_index, "skipping malformed embedding row");
            continue;
        };
        let Ok(chunk_index) = usize::try_from(chunk_index) else {
            continue;
        };
        out.push(StoredChunk {
            doc_id,
            chunk_index,
            embedding,
        });
    }

    Ok(out)
}

/// Dimension of the vectors already in the store, if any.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn stored_dimension(conn: &Connection) -> Result<Option<usize>> {
    let sample = conn
        .query_row("SELECT embedding_json FROM chunks LIMIT 1", [], |row| {
            row.get::<_, String>(0)
        })
        .optional()
        .context("sample stored embedding")?;

    Ok(sample
        .as_deref()
        .and_then(decode_embedding_json)
        .map(|v| v.len()))
}

fn chunk_texts(conn: &Connection, doc_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT content FROM chunks WHERE doc_id = ?1 ORDER BY chunk_index ASC")
        .context("prepare chunk text lookup")?;
    let rows = stmt
        .query_map(params![doc_id], |row| row.get::<_, String>(0))
        .with_context(|| format!("execute chunk text lookup for {doc_id}"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read chunk text for {doc_id}"))
}

/// Hex SHA-256 of chunk content.
#[must_use]
pub fn content_hash_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Encode a vector as a JSON float array, the format `vec_f32()` accepts.
#[must_use]
pub fn encode_embedding_json(embedding: &[f32]) -> String {
    let mut encoded = String::from("[");
    for (idx, value) in embedding.iter().enumerate() {
        if idx != 0 {
            encoded.push(',');
        }
        encoded.push_str(&value.to_string());
    }
    encoded.push(']');
    encoded
}

fn decode_embedding_json(encoded: &str) -> Option<EmbeddingVector> {
    serde_json::from_str::<Vec<f32>>(encoded)
        .ok()
        .filter(|v| !v.is_empty())
}
