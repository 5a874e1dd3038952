//! Fold per-chunk retrieval hits into per-document candidates.
//!
//! Every query chunk contributes its hits independently by addition, so the
//! accumulated scores do not depend on the order chunks are processed in.
//! A retrieval failure for one chunk drops only that chunk's contribution,
//! except a dimension mismatch, which means the index and the query embedder
//! disagree and is surfaced to the caller.

use super::{Deadline, RetrievalHit, Retriever};
use crate::scoring::ScoredChunk;
use dupscan_core::DupError;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Accumulated evidence that a stored document overlaps the new content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    pub doc_id: String,
    /// Sum of every hit similarity that referenced this document.
    pub accumulated_score: f32,
    /// Matched chunk indices in the order hits arrived. May repeat.
    pub chunk_indices: Vec<usize>,
}

/// Running candidate map that remembers first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CandidateAccumulator {
    records: Vec<CandidateRecord>,
    index: HashMap<String, usize>,
}

impl CandidateAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one query's hits into the map.
    ///
    /// Every hit records its chunk index. Negative or non-finite
    /// similarities add zero, so no hit ever lowers a candidate's score.
    pub fn fold(&mut self, hits: &[RetrievalHit]) {
        for hit in hits {
            let score = if hit.score.is_finite() {
                hit.score.max(0.0)
            } else {
                debug!(doc_id = %hit.doc_id, "non-finite retrieval score counts as zero");
                0.0
            };

            if let Some(&slot) = self.index.get(&hit.doc_id) {
                let record = &mut self.records[slot];
                record.accumulated_score += score;
                record.chunk_indices.push(hit.chunk_index);
            } else {
                self.index.insert(hit.doc_id.clone(), self.records.len());
                self.records.push(CandidateRecord {
                    doc_id: hit.doc_id.clone(),
                    accumulated_score: score,
                    chunk_indices: vec![hit.chunk_index],
                });
            }
        }
    }

    #[must_use]
    pub fn get(&self, doc_id: &str) -> Option<&CandidateRecord> {
        self.index.get(doc_id).map(|&slot| &self.records[slot])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All candidates by accumulated score, highest first, keeping the
    /// `top_docs` best. Equal scores keep first-seen order.
    #[must_use]
    pub fn select_top(self, top_docs: usize) -> Vec<CandidateRecord> {
        let mut ranked = self.records;
        ranked.sort_by(|a, b| b.accumulated_score.total_cmp(&a.accumulated_score));
        ranked.truncate(top_docs);
        ranked
    }
}

/// Outcome of a retrieval fan-out.
#[derive(Debug, Clone, Default)]
pub struct Accumulation {
    pub candidates: CandidateAccumulator,
    /// Query chunks whose retrieval call failed.
    pub failed_queries: usize,
    /// Query chunks never issued because the deadline passed.
    pub skipped_queries: usize,
}

impl Accumulation {
    #[must_use]
    pub const fn timed_out(&self) -> bool {
        self.skipped_queries > 0
    }
}

/// Query `retriever` once per chunk and fold every hit into a candidate map.
///
/// Failing queries are logged and skipped. Once `deadline` has passed no
/// further queries are issued and the map built so far is returned.
///
/// # Errors
///
/// Returns [`DupError::DimensionMismatch`] if the retriever reports one.
pub fn accumulate<R: Retriever + ?Sized>(
    retriever: &R,
    top_chunks: &[ScoredChunk],
    category: &str,
    top_k: usize,
    deadline: Deadline,
) -> Result<Accumulation, DupError> {
    let mut out = Accumulation::default();

    for (issued, chunk) in top_chunks.iter().enumerate() {
        if deadline.is_expired() {
            out.skipped_queries = top_chunks.len() - issued;
            warn!(
                skipped = out.skipped_queries,
                "deadline passed during retrieval fan-out"
            );
            break;
        }

        match retriever.query(&chunk.text, top_k, category) {
            Ok(hits) => {
                debug!(position = chunk.position, hits = hits.len(), "retrieved");
                out.candidates.fold(&hits);
            }
            Err(err) => {
                if let Some(mismatch @ DupError::DimensionMismatch { .. }) =
                    err.downcast_ref::<DupError>()
                {
                    return Err(mismatch.clone());
                }
                out.failed_queries += 1;
                warn!(
                    position = chunk.position,
                    "retrieval failed, skipping chunk: {err:#}"
                );
            }
        }
    }

    Ok(out)
}
