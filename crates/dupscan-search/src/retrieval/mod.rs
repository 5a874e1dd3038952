//! Retrieval collaborators and candidate accumulation.
//!
//! The pipeline never talks to an index directly. It is handed a
//! [`Retriever`] for nearest-neighbor queries and a [`VectorLookup`] for
//! fetching a candidate's stored vectors, so tests can script both.

pub mod accumulate;

pub use accumulate::{Accumulation, CandidateAccumulator, CandidateRecord, accumulate};

use anyhow::Result;
use dupscan_core::model::EmbeddingVector;
use serde::Serialize;
use std::time::{Duration, Instant};

/// One nearest-neighbor hit for a query chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub doc_id: String,
    /// Embedding-space similarity, higher is closer.
    pub score: f32,
    /// Index of the matched chunk within `doc_id`.
    pub chunk_index: usize,
}

/// Nearest-neighbor retrieval over stored chunks.
pub trait Retriever {
    /// Up to `k` hits for `text` among documents in `category`, sorted by
    /// similarity descending.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding the query or reading the index fails.
    fn query(&self, text: &str, k: usize, category: &str) -> Result<Vec<RetrievalHit>>;
}

/// Stored vectors by document id.
pub trait VectorLookup {
    /// Every stored embedding of `doc_id`. Unknown ids yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn vectors_for(&self, doc_id: &str) -> Result<Vec<EmbeddingVector>>;
}

impl<T: Retriever + ?Sized> Retriever for &T {
    fn query(&self, text: &str, k: usize, category: &str) -> Result<Vec<RetrievalHit>> {
        (**self).query(text, k, category)
    }
}

impl<T: VectorLookup + ?Sized> VectorLookup for &T {
    fn vectors_for(&self, doc_id: &str) -> Result<Vec<EmbeddingVector>> {
        (**self).vectors_for(doc_id)
    }
}

/// A request-wide point in time after which no collaborator call is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// `timeout` from now. A zero timeout means no deadline.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        if timeout.is_zero() {
            return Self::none();
        }
        Self(Instant::now().checked_add(timeout))
    }

    /// An already-passed deadline.
    #[must_use]
    pub fn expired_now() -> Self {
        Self(Some(Instant::now()))
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_never_expires() {
        assert!(!Deadline::after(Duration::ZERO).is_expired());
        assert!(!Deadline::none().is_expired());
    }

    #[test]
    fn passed_deadline_is_expired() {
        assert!(Deadline::expired_now().is_expired());
        assert!(!Deadline::after(Duration::from_secs(3600)).is_expired());
    }
}
