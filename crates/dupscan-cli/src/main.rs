#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "dupscan: find near-duplicate documents in a knowledge base",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (pretty, text, json). Overrides `--json` and `FORMAT`.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Knowledge base",
        about = "Initialize a knowledge base",
        long_about = "Create .dupscan/ with a default config.toml and an empty knowledge base.",
        after_help = "EXAMPLES:\n    # Initialize in the current directory\n    dupscan init\n\n    # Reset config.toml to defaults\n    dupscan init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Knowledge base",
        about = "Add a document",
        long_about = "Chunk, embed and store a document under a category.",
        after_help = "EXAMPLES:\n    # Add a markdown file\n    dupscan add --category help --type markdown --file guide.md\n\n    # Add inline text with tags\n    dupscan add --category faq --content \"How do I reset my password?\" --tag auth"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Knowledge base",
        about = "Delete documents",
        after_help = "EXAMPLES:\n    # Delete two documents\n    dupscan delete 1760000000000 1760000000001"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Knowledge base",
        about = "List stored documents",
        after_help = "EXAMPLES:\n    # List everything\n    dupscan list\n\n    # List one category as JSON\n    dupscan list --category help --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Search",
        about = "Show how content is chunked and ranked",
        long_about = "Split content into chunks and print them in query order, highest heuristic score first.",
        after_help = "EXAMPLES:\n    # Inspect the chunks of a markdown file\n    dupscan chunks --type markdown --file guide.md"
    )]
    Chunks(cmd::chunks::ChunksArgs),

    #[command(
        next_help_heading = "Search",
        about = "Find likely duplicates of new content",
        long_about = "Find stored documents in a category that likely duplicate the given content.\n\n\
                      The highest-scoring chunks are used as retrieval queries, hits are \
                      accumulated per document, and the top documents are re-scored by \
                      chunk-vector overlap. Nothing is written to the knowledge base.",
        after_help = "EXAMPLES:\n    # Check a draft article\n    dupscan dup --category help --type markdown --file draft.md\n\n    # Wider fan-out with a 5 second deadline\n    dupscan dup --category help --file draft.md --top-nchunk 20 --top-k 5 --timeout-ms 5000\n\n    # Machine-readable output\n    dupscan dup --category help --content \"...\" --json"
    )]
    Dup(cmd::dup::DupArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DUPSCAN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "dupscan=debug,info"
        } else {
            "dupscan=info,warn"
        })
    });

    let format = env::var("DUPSCAN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    if let Err(err) = dupscan_sqlite_vec::register_auto_extension() {
        debug!("sqlite-vec unavailable, using in-process vector scoring: {err}");
    }

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(ref args) => cmd::init::run_init(args, output, &project_root),
        Commands::Add(ref args) => cmd::add::run_add(args, output, &project_root),
        Commands::Delete(ref args) => cmd::delete::run_delete(args, output, &project_root),
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root),
        Commands::Chunks(ref args) => cmd::chunks::run_chunks(args, output, &project_root),
        Commands::Dup(ref args) => cmd::dup::run_dup(args, output, &project_root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["dupscan", "list", "--json"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn format_flag_parses() {
        let cli = Cli::parse_from(["dupscan", "--format", "text", "list"]);
        assert_eq!(cli.format, Some(OutputMode::Text));
        assert_eq!(cli.output_mode(), OutputMode::Text);
    }

    #[test]
    fn init_force_parses() {
        let cli = Cli::parse_from(["dupscan", "init", "--force"]);
        assert!(matches!(cli.command, Commands::Init(ref a) if a.force));
    }

    #[test]
    fn add_requires_category() {
        assert!(Cli::try_parse_from(["dupscan", "add", "--content", "x"]).is_err());
        let cli = Cli::parse_from(["dupscan", "add", "-c", "faq", "--content", "x", "--tag", "a"]);
        assert!(matches!(cli.command, Commands::Add(_)));
    }

    #[test]
    fn content_and_file_conflict() {
        let res = Cli::try_parse_from([
            "dupscan", "dup", "-c", "faq", "--content", "x", "--file", "draft.md",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn dup_overrides_parse() {
        let cli = Cli::parse_from([
            "dupscan",
            "dup",
            "--category",
            "help",
            "--content",
            "draft",
            "--top-docs",
            "3",
            "--top-nchunk",
            "7",
            "--top-k",
            "2",
            "--timeout-ms",
            "0",
        ]);
        let Commands::Dup(args) = cli.command else {
            panic!("expected dup");
        };
        assert_eq!(args.top_docs, Some(3));
        assert_eq!(args.top_nchunk, Some(7));
        assert_eq!(args.top_k, Some(2));
        assert_eq!(args.timeout_ms, Some(0));
    }

    #[test]
    fn delete_requires_ids() {
        assert!(Cli::try_parse_from(["dupscan", "delete"]).is_err());
        let cli = Cli::parse_from(["dupscan", "delete", "a", "b"]);
        assert!(matches!(cli.command, Commands::Delete(ref a) if a.ids.len() == 2));
    }
}
