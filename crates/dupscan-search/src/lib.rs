#![forbid(unsafe_code)]
//! dupscan-search library.
//!
//! The duplicate-candidate pipeline and the collaborators it talks to.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` for collaborator calls; request validation
//!   failures are [`dupscan_core::DupError`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod duplicates;
pub mod fusion;
pub mod overlap;
pub mod retrieval;
pub mod scoring;
pub mod semantic;

pub use duplicates::{DuplicateCandidate, DuplicateReport, DuplicateSearch, SearchParams};
pub use overlap::overlap;
pub use retrieval::{RetrievalHit, Retriever, VectorLookup};
pub use scoring::{ChunkScorer, ScoredChunk};
