//! Duplicate-candidate search.
//!
//! Given new content, find the stored documents it most likely duplicates:
//!
//! 1. **Chunk and score**: split the content and rank chunks with the
//!    [`ChunkScorer`].
//! 2. **Retrieve and accumulate**: query the [`Retriever`] with the
//!    `top_nchunk` best chunks, `top_k` neighbors each, summing hit scores
//!    per document.
//! 3. **Select**: keep the `top_docs` documents by accumulated score.
//! 4. **Fetch vectors**: load every stored vector of each selected document
//!    through the [`VectorLookup`].
//! 5. **Evaluate overlap**: compare the new content's chunk vectors with
//!    each candidate's vectors using [`overlap`].
//!
//! # Graceful degradation
//!
//! - A retrieval failure skips that query chunk.
//! - A failed or empty vector lookup scores the candidate `0.0`.
//! - Blank content, zero chunks, or only zero-norm chunk embeddings yield an
//!   empty result.
//! - Once the request deadline passes no further collaborator call is made.
//!   Selected candidates that were not evaluated in time are still returned
//!   in [`DuplicateReport::unevaluated`] with their retrieval evidence.
//!
//! Invalid requests (unknown content type, zero tuning parameter, mismatched
//! embedding dimensions) are rejected with a [`DupError`].

use crate::overlap::{normalize, overlap};
use crate::retrieval::{CandidateRecord, Deadline, Retriever, VectorLookup, accumulate};
use crate::scoring::ChunkScorer;
use crate::semantic::Embedder;
use dupscan_core::DupError;
use dupscan_core::chunk::Chunker;
use dupscan_core::config::SearchConfig;
use dupscan_core::model::{ContentType, EmbeddingVector};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Tuning parameters for one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Final candidates returned.
    pub top_docs: usize,
    /// Highest-scoring chunks used as retrieval queries.
    pub top_nchunk: usize,
    /// Neighbors fetched per query chunk.
    pub top_k: usize,
    /// Whole-request deadline; zero disables it.
    pub timeout: Duration,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

impl SearchParams {
    #[must_use]
    pub const fn from_config(config: &SearchConfig) -> Self {
        Self {
            top_docs: config.top_docs,
            top_nchunk: config.top_nchunk,
            top_k: config.top_k,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// # Errors
    ///
    /// Returns [`DupError::NonPositiveParameter`] naming the first zero
    /// parameter.
    pub const fn validate(&self) -> Result<(), DupError> {
        if self.top_docs == 0 {
            return Err(DupError::NonPositiveParameter { name: "top_docs" });
        }
        if self.top_nchunk == 0 {
            return Err(DupError::NonPositiveParameter { name: "top_nchunk" });
        }
        if self.top_k == 0 {
            return Err(DupError::NonPositiveParameter { name: "top_k" });
        }
        Ok(())
    }
}

/// A stored document evaluated against new content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateCandidate {
    pub doc_id: String,
    /// Symmetric overlap in `[0, 1]`.
    pub score: f32,
    /// Sum of retrieval similarities that selected this document.
    pub accumulated_score: f32,
    /// Stored chunk indices the query chunks hit.
    pub matched_chunks: Vec<usize>,
    /// Stored vectors compared against.
    pub vector_count: usize,
}

/// Everything a search produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicateReport {
    /// Evaluated candidates in selection order (accumulated score, highest
    /// first).
    pub candidates: Vec<DuplicateCandidate>,
    /// Selected candidates the deadline left unevaluated, in selection order.
    pub unevaluated: Vec<CandidateRecord>,
    /// Chunks the content was split into.
    pub chunk_count: usize,
    /// Retrieval queries that failed and were skipped.
    pub failed_queries: usize,
    /// True when the deadline cut the search short.
    pub timed_out: bool,
}

impl DuplicateReport {
    /// Candidates by overlap score, highest first.
    #[must_use]
    pub fn ranked(&self) -> Vec<&DuplicateCandidate> {
        let mut ranked: Vec<&DuplicateCandidate> = self.candidates.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    /// `doc_id -> score`. Unevaluated candidates map to `0.0`.
    #[must_use]
    pub fn into_scores(self) -> HashMap<String, f32> {
        self.unevaluated
            .into_iter()
            .map(|r| (r.doc_id, 0.0))
            .chain(self.candidates.into_iter().map(|c| (c.doc_id, c.score)))
            .collect()
    }
}

/// The duplicate-candidate pipeline wired to its collaborators.
///
/// Holds only borrowed handles; one instance can serve many requests.
pub struct DuplicateSearch<'a> {
    chunker: &'a dyn Chunker,
    embedder: &'a dyn Embedder,
    retriever: &'a dyn Retriever,
    vectors: &'a dyn VectorLookup,
    scorer: ChunkScorer,
}

impl<'a> DuplicateSearch<'a> {
    #[must_use]
    pub fn new(
        chunker: &'a dyn Chunker,
        embedder: &'a dyn Embedder,
        retriever: &'a dyn Retriever,
        vectors: &'a dyn VectorLookup,
    ) -> Self {
        Self {
            chunker,
            embedder,
            retriever,
            vectors,
            scorer: ChunkScorer::default(),
        }
    }

    #[must_use]
    pub fn with_scorer(mut self, scorer: ChunkScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// `doc_id -> overlap score` for the best candidates.
    ///
    /// No deadline applies, so every selected candidate is evaluated.
    ///
    /// # Errors
    ///
    /// See [`DuplicateSearch::search`].
    pub fn find_duplicates(
        &self,
        content: &str,
        category: &str,
        content_type: &str,
        top_docs: usize,
        top_nchunk: usize,
        top_k: usize,
    ) -> Result<HashMap<String, f32>, DupError> {
        let params = SearchParams {
            top_docs,
            top_nchunk,
            top_k,
            timeout: Duration::ZERO,
        };
        self.search(content, category, content_type, &params)
            .map(DuplicateReport::into_scores)
    }

    /// Run the full pipeline and report every evaluated candidate.
    ///
    /// # Errors
    ///
    /// - [`DupError::UnsupportedContentType`] for an unknown content type
    /// - [`DupError::NonPositiveParameter`] if any parameter is zero
    /// - [`DupError::DimensionMismatch`] if query, index and stored vectors
    ///   disagree on dimension
    #[instrument(skip(self, content, params), fields(
        top_docs = params.top_docs,
        top_nchunk = params.top_nchunk,
        top_k = params.top_k,
    ))]
    pub fn search(
        &self,
        content: &str,
        category: &str,
        content_type: &str,
        params: &SearchParams,
    ) -> Result<DuplicateReport, DupError> {
        let content_type: ContentType = content_type.parse()?;
        params.validate()?;
        let deadline = Deadline::after(params.timeout);

        let chunks = self.chunker.split(content, content_type);
        let mut report = DuplicateReport {
            chunk_count: chunks.len(),
            ..DuplicateReport::default()
        };
        if chunks.is_empty() {
            debug!("content produced no chunks");
            return Ok(report);
        }

        let mut ranked = self.scorer.rank(&chunks);
        ranked.truncate(params.top_nchunk);

        let accumulation = accumulate(
            self.retriever,
            &ranked,
            category,
            params.top_k,
            deadline,
        )?;
        report.failed_queries = accumulation.failed_queries;
        report.timed_out = accumulation.timed_out();

        let selected = accumulation.candidates.select_top(params.top_docs);
        if selected.is_empty() {
            debug!("no candidates retrieved");
            return Ok(report);
        }

        if deadline.is_expired() {
            warn!(
                unevaluated = selected.len(),
                "deadline passed before candidate evaluation"
            );
            report.timed_out = true;
            report.unevaluated = selected;
            return Ok(report);
        }
        let targets = self.target_vectors(&chunks, deadline)?;
        if targets.is_empty() {
            if deadline.is_expired() {
                warn!("deadline passed while embedding submitted content");
                report.timed_out = true;
                report.unevaluated = selected;
            } else {
                warn!("no usable embeddings for submitted content");
            }
            return Ok(report);
        }

        let mut pending = selected.into_iter();
        while let Some(record) = pending.next() {
            if deadline.is_expired() {
                report.unevaluated.push(record);
                report.unevaluated.extend(pending.by_ref());
                warn!(
                    evaluated = report.candidates.len(),
                    unevaluated = report.unevaluated.len(),
                    "deadline passed during candidate evaluation"
                );
                report.timed_out = true;
                break;
            }

            let (score, vector_count) = self.evaluate(&record.doc_id, &targets)?;
            report.candidates.push(DuplicateCandidate {
                doc_id: record.doc_id,
                score,
                accumulated_score: record.accumulated_score,
                matched_chunks: record.chunk_indices,
                vector_count,
            });
        }

        info!(
            candidates = report.candidates.len(),
            unevaluated = report.unevaluated.len(),
            timed_out = report.timed_out,
            "duplicate search complete"
        );
        Ok(report)
    }

    /// Embeddings of every chunk of the new content, zero-norm ones dropped.
    fn target_vectors(
        &self,
        chunks: &[String],
        deadline: Deadline,
    ) -> Result<Vec<EmbeddingVector>, DupError> {
        let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embedded: Vec<EmbeddingVector> = match self.embedder.embed_batch(&texts) {
            Ok(vectors) => vectors,
            Err(err) => {
                warn!("batch embedding failed, embedding chunks one by one: {err:#}");
                let mut vectors = Vec::new();
                for (position, text) in texts.iter().enumerate() {
                    if deadline.is_expired() {
                        break;
                    }
                    match self.embedder.embed(text) {
                        Ok(v) => vectors.push(v),
                        Err(err) => warn!(position, "embedding failed, skipping chunk: {err:#}"),
                    }
                }
                vectors
            }
        };

        let Some(dimension) = embedded.first().map(Vec::len) else {
            return Ok(Vec::new());
        };
        let mut targets = Vec::with_capacity(embedded.len());
        for vector in embedded {
            if vector.len() != dimension {
                return Err(DupError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            if normalize(&vector).is_none() {
                debug!("dropping zero-norm target vector");
                continue;
            }
            targets.push(vector);
        }
        Ok(targets)
    }

    /// Overlap score and compared vector count for one candidate.
    fn evaluate(
        &self,
        doc_id: &str,
        targets: &[EmbeddingVector],
    ) -> Result<(f32, usize), DupError> {
        let stored = match self.vectors.vectors_for(doc_id) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(doc_id, "vector lookup failed, scoring 0: {err:#}");
                return Ok((0.0, 0));
            }
        };

        let usable: Vec<EmbeddingVector> = stored
            .into_iter()
            .filter(|v| normalize(v).is_some())
            .collect();
        if usable.is_empty() {
            warn!(doc_id, "candidate has no retrievable vectors, scoring 0");
            return Ok((0.0, 0));
        }

        match overlap(targets, &usable) {
            Ok(score) => Ok((score, usable.len())),
            Err(err @ DupError::DimensionMismatch { .. }) => Err(err),
            Err(err) => {
                warn!(doc_id, "overlap evaluation failed, scoring 0: {err}");
                Ok((0.0, usable.len()))
            }
        }
    }
}

impl std::fmt::Debug for DuplicateSearch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateSearch")
            .field("scorer", &self.scorer)
            .finish_non_exhaustive()
    }
}
