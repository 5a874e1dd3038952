//! `dupscan add`: chunk, embed and store a document.

use crate::cmd::{InputArgs, fail_with_any, load_config, open_existing_kb, parse_content_type};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use clap::Args;
use dupscan_core::ErrorCode;
use dupscan_core::chunk::DefaultChunker;
use dupscan_search::semantic::{IngestPipeline, embedder_from_config};
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Category the document is filed under.
    #[arg(short, long)]
    pub category: String,

    /// Tag to attach. Repeat for more than one.
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Serialize)]
struct AddOutput {
    id: String,
    category: String,
    content_type: String,
}

/// Execute `dupscan add`.
///
/// # Errors
///
/// Returns an error if the knowledge base is missing, the content is blank
/// or has an unsupported type, or embedding/storage fails.
pub fn run_add(args: &AddArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let content_type = parse_content_type(output, &args.input.content_type)?;
    let config = load_config(output, project_root)?;
    let conn = open_existing_kb(output, project_root)?;
    let content = args.input.read()?;

    let embedder = match embedder_from_config(&config.embedding) {
        Ok(e) => e,
        Err(err) => return fail_with_any(output, err, ErrorCode::EmbeddingUnavailable),
    };
    let chunker = DefaultChunker::new(config.chunking.clone());

    let id = match IngestPipeline::new(&conn, &chunker, embedder.as_ref()).add(
        &content,
        &args.category,
        content_type,
        &args.tags,
    ) {
        Ok(id) => id,
        Err(err) => return fail_with_any(output, err, ErrorCode::InternalUnexpected),
    };

    let result = AddOutput {
        id,
        category: args.category.clone(),
        content_type: content_type.to_string(),
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "{}", r.id),
        |r, w| {
            pretty_section(w, "Added document")?;
            pretty_kv(w, "ID", &r.id)?;
            pretty_kv(w, "Category", &r.category)?;
            pretty_kv(w, "Type", &r.content_type)
        },
    )
}
