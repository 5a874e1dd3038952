use crate::cmd::open_existing_kb;
use crate::output::{OutputMode, first_line, pretty_rule, pretty_section, render_mode};
use chrono::{DateTime, Utc};
use clap::Args;
use dupscan_core::db::store;
use dupscan_core::model::DocumentSummary;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only list documents in this category.
    #[arg(short, long)]
    pub category: Option<String>,
}

fn created_label(created_at_us: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(created_at_us)
        .map_or_else(|| "-".to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

/// Execute `dupscan list`, oldest document first.
///
/// # Errors
///
/// Returns an error if the knowledge base is missing or unreadable.
pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let conn = open_existing_kb(output, project_root)?;
    let docs = store::list_documents(&conn, args.category.as_deref())?;

    render_mode(
        output,
        &docs,
        |docs: &Vec<DocumentSummary>, w| {
            for doc in docs {
                writeln!(
                    w,
                    "{}  {}  {}  {}",
                    doc.id,
                    doc.category,
                    doc.chunk_count,
                    first_line(&doc.content, 60)
                )?;
            }
            Ok(())
        },
        |docs: &Vec<DocumentSummary>, w| {
            pretty_section(w, &format!("Documents ({})", docs.len()))?;
            for doc in docs {
                writeln!(
                    w,
                    "{:<15} {:<12} {:<9} {:>3} chunks  {}",
                    doc.id,
                    doc.category,
                    doc.content_type,
                    doc.chunk_count,
                    created_label(doc.created_at_us)
                )?;
                writeln!(w, "    {}", first_line(&doc.content, 64))?;
                if !doc.tags.is_empty() {
                    writeln!(w, "    tags: {}", doc.tags.join(", "))?;
                }
            }
            if docs.is_empty() {
                writeln!(w, "(none)")?;
            }
            pretty_rule(w)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::created_label;

    #[test]
    fn created_label_formats_utc() {
        assert_eq!(created_label(0), "1970-01-01 00:00");
        assert_eq!(created_label(1_700_000_000_000_000), "2023-11-14 22:13");
    }
}
