use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context as _, Result};
use clap::Args;
use dupscan_core::config::{self, CONFIG_FILE};
use dupscan_core::db;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Reinitialize even if `.dupscan/` already exists. Resets `config.toml`
    /// to defaults; stored documents are kept.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "kb.sqlite3\nkb.sqlite3-wal\nkb.sqlite3-shm\n";

#[derive(Debug, Serialize)]
struct InitOutput {
    path: String,
    config_written: bool,
    documents: usize,
}

/// Execute `dupscan init`. Creates:
///
/// ```text
/// .dupscan/
///   config.toml   (default search, weights, embedding and chunking settings)
///   kb.sqlite3    (empty, migrated knowledge base)
///   .gitignore
/// ```
///
/// # Errors
///
/// Returns an error if `.dupscan/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let dir = config::dupscan_dir(project_root);

    if dir.exists() && !args.force {
        anyhow::bail!(".dupscan/ already exists. Use `dupscan init --force` to reinitialize.");
    }

    if args.force {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            std::fs::remove_file(&config_path)
                .with_context(|| format!("Failed to remove {}", config_path.display()))?;
        }
    }

    let config_written = config::write_default_config(project_root)?;
    std::fs::write(dir.join(".gitignore"), GITIGNORE).context("Failed to write .gitignore")?;

    let conn = db::open_kb(&config::db_path(project_root))?;
    let documents = dupscan_core::db::store::list_documents(&conn, None)?.len();
    tracing::info!(path = %dir.display(), documents, "initialized knowledge base");

    let result = InitOutput {
        path: dir.display().to_string(),
        config_written,
        documents,
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "initialized {}", r.path),
        |r, w| {
            pretty_section(w, "Initialized dupscan")?;
            pretty_kv(w, "Path", &r.path)?;
            pretty_kv(w, "Config", if r.config_written { "written" } else { "kept" })?;
            pretty_kv(w, "Documents", r.documents.to_string())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_layout() -> Result<()> {
        let dir = tempfile::tempdir()?;
        run_init(&InitArgs { force: false }, OutputMode::Json, dir.path())?;

        assert!(dir.path().join(".dupscan/config.toml").exists());
        assert!(dir.path().join(".dupscan/kb.sqlite3").exists());
        assert!(dir.path().join(".dupscan/.gitignore").exists());
        Ok(())
    }

    #[test]
    fn second_init_requires_force() -> Result<()> {
        let dir = tempfile::tempdir()?;
        run_init(&InitArgs { force: false }, OutputMode::Json, dir.path())?;
        assert!(run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).is_err());

        std::fs::write(dir.path().join(".dupscan/config.toml"), "[search]\ntop_k = 9\n")?;
        run_init(&InitArgs { force: true }, OutputMode::Json, dir.path())?;
        let cfg = config::load_project_config(dir.path())?;
        assert_eq!(cfg.search.top_k, 3);
        Ok(())
    }
}
