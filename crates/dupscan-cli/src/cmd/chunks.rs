use crate::cmd::{InputArgs, load_config, parse_content_type};
use crate::output::{OutputMode, first_line, pretty_section, render_mode};
use clap::Args;
use dupscan_core::chunk::{Chunker, DefaultChunker};
use dupscan_search::{ChunkScorer, ScoredChunk};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ChunksArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Only show the first N chunks in query order.
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Execute `dupscan chunks`: print chunks in the order `dup` would query
/// them. Works without an initialized knowledge base.
///
/// # Errors
///
/// Returns an error for an unsupported content type, unreadable input or a
/// malformed config.
pub fn run_chunks(args: &ChunksArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let content_type = parse_content_type(output, &args.input.content_type)?;
    let config = load_config(output, project_root)?;
    let content = args.input.read()?;

    let chunks = DefaultChunker::new(config.chunking).split(&content, content_type);
    let mut ranked = ChunkScorer::new(config.weights).rank(&chunks);
    if let Some(limit) = args.limit {
        ranked.truncate(limit);
    }

    render_mode(
        output,
        &ranked,
        |ranked: &Vec<ScoredChunk>, w| {
            for chunk in ranked {
                writeln!(
                    w,
                    "{:.3}  #{}  {}",
                    chunk.score,
                    chunk.position,
                    first_line(&chunk.text, 60)
                )?;
            }
            Ok(())
        },
        |ranked: &Vec<ScoredChunk>, w| {
            pretty_section(w, &format!("Chunks ({} of {})", ranked.len(), chunks.len()))?;
            for chunk in ranked {
                writeln!(w, "[{:>3}] score {:.3}", chunk.position, chunk.score)?;
                for line in chunk.text.lines().take(3) {
                    writeln!(w, "      {}", first_line(line, 66))?;
                }
            }
            Ok(())
        },
    )
}
