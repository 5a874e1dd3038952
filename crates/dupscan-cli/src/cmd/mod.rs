pub mod add;
pub mod chunks;
pub mod delete;
pub mod dup;
pub mod init;
pub mod list;

use crate::output::{CliError, OutputMode, render_error};
use anyhow::Context;
use clap::Args;
use dupscan_core::config;
use dupscan_core::db;
use dupscan_core::model::ContentType;
use dupscan_core::{DupError, ErrorCode};
use rusqlite::Connection;
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};

/// Where the content comes from. Falls back to stdin when neither flag is set.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Inline content.
    #[arg(long, conflicts_with = "file")]
    pub content: Option<String>,

    /// Read content from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Content type: text, markdown or code.
    #[arg(long = "type", default_value = "text")]
    pub content_type: String,
}

impl InputArgs {
    /// Resolve the content body.
    pub fn read(&self) -> anyhow::Result<String> {
        if let Some(content) = &self.content {
            return Ok(content.clone());
        }
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("read {}", path.display()));
        }

        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            anyhow::bail!("no content given: pass --content, --file, or pipe it on stdin");
        }
        let mut buf = String::new();
        stdin.lock().read_to_string(&mut buf).context("read stdin")?;
        Ok(buf)
    }
}

/// Open the project knowledge base, rendering a structured error if it has
/// not been initialized.
pub fn open_existing_kb(output: OutputMode, project_root: &Path) -> anyhow::Result<Connection> {
    let path = config::db_path(project_root);
    if let Some(conn) = db::try_open_kb(&path)? {
        return Ok(conn);
    }

    render_error(
        output,
        &CliError::from_code(
            ErrorCode::NotInitialized,
            format!("knowledge base not found at {}", path.display()),
        ),
    )?;
    anyhow::bail!("knowledge base not initialized");
}

/// Load the project config, rendering a structured error on parse failure.
pub fn load_config(output: OutputMode, project_root: &Path) -> anyhow::Result<config::ProjectConfig> {
    match config::load_project_config(project_root) {
        Ok(cfg) => Ok(cfg),
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            Err(err)
        }
    }
}

/// Parse a `--type` value, rendering a structured error when unsupported.
pub fn parse_content_type(output: OutputMode, raw: &str) -> anyhow::Result<ContentType> {
    raw.parse::<ContentType>()
        .or_else(|err| fail_with(output, err))
}

/// Render `err` and return it as the command failure.
pub fn fail_with<T>(output: OutputMode, err: DupError) -> anyhow::Result<T> {
    render_error(output, &CliError::from(&err))?;
    Err(err.into())
}

/// Render an `anyhow` error that may wrap a [`DupError`].
///
/// Errors without a known code are reported under `fallback`.
pub fn fail_with_any<T>(
    output: OutputMode,
    err: anyhow::Error,
    fallback: ErrorCode,
) -> anyhow::Result<T> {
    let cli_err = err.downcast_ref::<DupError>().map_or_else(
        || CliError::from_code(fallback, format!("{err:#}")),
        CliError::from,
    );
    render_error(output, &cli_err)?;
    Err(err)
}
