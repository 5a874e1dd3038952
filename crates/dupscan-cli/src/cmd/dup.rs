//! `dupscan dup`: find stored documents that likely duplicate new content.
//!
//! The knowledge base acts as both retriever and vector store. Final scores
//! are classified using thresholds from `.dupscan/config.toml`:
//! - `search.likely_duplicate_threshold` (default 0.90) → `likely_duplicate`
//! - `search.possibly_related_threshold` (default 0.75) → `possibly_related`
//! - `search.maybe_related_threshold` → `maybe_related`
//! - below that → `none`
//!
//! Candidates the request deadline left unevaluated are listed separately
//! with their retrieval evidence only.

use crate::cmd::{InputArgs, fail_with, fail_with_any, load_config, open_existing_kb};
use crate::output::{OutputMode, first_line, pretty_kv, pretty_rule, pretty_section, render_mode};
use clap::Args;
use dupscan_core::ErrorCode;
use dupscan_core::chunk::DefaultChunker;
use dupscan_core::db::store;
use dupscan_search::fusion::{DuplicateRisk, classify_risk};
use dupscan_search::semantic::{SqliteIndex, embedder_from_config};
use dupscan_search::{ChunkScorer, DuplicateSearch, SearchParams};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct DupArgs {
    /// Category to search in.
    #[arg(short, long)]
    pub category: String,

    #[command(flatten)]
    pub input: InputArgs,

    /// Number of candidates to return. Defaults to `search.top_docs`.
    #[arg(long)]
    pub top_docs: Option<usize>,

    /// Number of chunks used as queries. Defaults to `search.top_nchunk`.
    #[arg(long)]
    pub top_nchunk: Option<usize>,

    /// Neighbors fetched per query chunk. Defaults to `search.top_k`.
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Request deadline in milliseconds, 0 for none. Defaults to
    /// `search.timeout_ms`.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl DupArgs {
    fn params(&self, base: SearchParams) -> SearchParams {
        SearchParams {
            top_docs: self.top_docs.unwrap_or(base.top_docs),
            top_nchunk: self.top_nchunk.unwrap_or(base.top_nchunk),
            top_k: self.top_k.unwrap_or(base.top_k),
            timeout: self.timeout_ms.map_or(base.timeout, Duration::from_millis),
        }
    }
}

#[derive(Debug, Serialize)]
struct DupRow {
    doc_id: String,
    score: f32,
    risk: DuplicateRisk,
    accumulated_score: f32,
    matched_chunks: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<String>,
}

#[derive(Debug, Serialize)]
struct UnevaluatedRow {
    doc_id: String,
    accumulated_score: f32,
    matched_chunks: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<String>,
}

#[derive(Debug, Serialize)]
struct DupOutput {
    category: String,
    chunk_count: usize,
    failed_queries: usize,
    timed_out: bool,
    count: usize,
    candidates: Vec<DupRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    unevaluated: Vec<UnevaluatedRow>,
}

/// One-line preview of a candidate's first stored chunk.
fn preview(conn: &Connection, doc_id: &str) -> anyhow::Result<Option<String>> {
    Ok(store::first_chunk_text(conn, doc_id)?.map(|text| first_line(&text, 60)))
}

/// Execute `dupscan dup`.
///
/// # Errors
///
/// Returns an error if the knowledge base is missing, a tuning parameter is
/// zero, the content type is unsupported, or embedding dimensions disagree.
pub fn run_dup(args: &DupArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let config = load_config(output, project_root)?;
    let conn = open_existing_kb(output, project_root)?;
    let content = args.input.read()?;

    let embedder = match embedder_from_config(&config.embedding) {
        Ok(e) => e,
        Err(err) => return fail_with_any(output, err, ErrorCode::EmbeddingUnavailable),
    };
    let chunker = DefaultChunker::new(config.chunking.clone());
    let index = SqliteIndex::new(&conn, embedder.as_ref());
    let params = args.params(SearchParams::from_config(&config.search));

    let report = match DuplicateSearch::new(&chunker, embedder.as_ref(), &index, &index)
        .with_scorer(ChunkScorer::new(config.weights.clone()))
        .search(&content, &args.category, &args.input.content_type, &params)
    {
        Ok(report) => report,
        Err(err) => return fail_with(output, err),
    };

    let candidates = report
        .ranked()
        .into_iter()
        .map(|c| {
            Ok(DupRow {
                doc_id: c.doc_id.clone(),
                score: c.score,
                risk: classify_risk(c.score, &config.search),
                accumulated_score: c.accumulated_score,
                matched_chunks: c.matched_chunks.clone(),
                preview: preview(&conn, &c.doc_id)?,
            })
        })
        .collect::<anyhow::Result<Vec<DupRow>>>()?;

    let unevaluated = report
        .unevaluated
        .iter()
        .map(|r| {
            Ok(UnevaluatedRow {
                doc_id: r.doc_id.clone(),
                accumulated_score: r.accumulated_score,
                matched_chunks: r.chunk_indices.clone(),
                preview: preview(&conn, &r.doc_id)?,
            })
        })
        .collect::<anyhow::Result<Vec<UnevaluatedRow>>>()?;

    let result = DupOutput {
        category: args.category.clone(),
        chunk_count: report.chunk_count,
        failed_queries: report.failed_queries,
        timed_out: report.timed_out,
        count: candidates.len(),
        candidates,
        unevaluated,
    };

    render_mode(
        output,
        &result,
        |r, w| {
            for c in &r.candidates {
                writeln!(w, "{}  {:.4}  {}", c.doc_id, c.score, c.risk)?;
            }
            for u in &r.unevaluated {
                writeln!(w, "{}  -  unevaluated", u.doc_id)?;
            }
            if r.timed_out {
                writeln!(w, "timed_out")?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, &format!("Duplicate candidates in '{}'", r.category))?;
            pretty_kv(w, "Chunks", r.chunk_count.to_string())?;
            if r.failed_queries > 0 {
                pretty_kv(w, "Failed", format!("{} quer(ies) skipped", r.failed_queries))?;
            }
            if r.timed_out {
                pretty_kv(w, "Deadline", "passed, results are partial")?;
            }
            pretty_rule(w)?;
            if r.candidates.is_empty() && r.unevaluated.is_empty() {
                writeln!(w, "No candidates found.")?;
            }
            for c in &r.candidates {
                writeln!(w, "{:<15} {:.4}  {}", c.doc_id, c.score, c.risk)?;
                if let Some(preview) = &c.preview {
                    writeln!(w, "    {preview}")?;
                }
            }
            for u in &r.unevaluated {
                writeln!(
                    w,
                    "{:<15} unevaluated (retrieval {:.4})",
                    u.doc_id, u.accumulated_score
                )?;
                if let Some(preview) = &u.preview {
                    writeln!(w, "    {preview}")?;
                }
            }
            Ok(())
        },
    )
}
