use crate::cmd::open_existing_kb;
use crate::output::{OutputMode, render_mode};
use clap::Args;
use dupscan_core::db::store;
use serde::Serialize;
use std::path::Path;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Document ids to delete.
    #[arg(required = true)]
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct DeleteOutput {
    requested: usize,
    deleted: usize,
}

/// Execute `dupscan delete`. Unknown ids are ignored.
///
/// # Errors
///
/// Returns an error if the knowledge base is missing or the delete fails.
pub fn run_delete(args: &DeleteArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let conn = open_existing_kb(output, project_root)?;
    let deleted = store::delete_documents(&conn, &args.ids)?;

    let result = DeleteOutput {
        requested: args.ids.len(),
        deleted,
    };
    render_mode(
        output,
        &result,
        |r, w| writeln!(w, "deleted {}", r.deleted),
        |r, w| writeln!(w, "Deleted {} of {} document(s)", r.deleted, r.requested),
    )
}
