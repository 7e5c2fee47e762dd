//! `tt list`: show feedback stored in the local JSONL log.

use crate::output::{
    CliError, OutputMode, Renderable, pretty_kv, pretty_rule, render_error, render_list,
};
use clap::Args;
use std::io::{self, Write};
use std::path::Path;
use tattle_core::store::{FeedbackRecord, load_records};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show only the most recent N entries.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

struct RecordRow(FeedbackRecord);

const DESCRIPTION_PREVIEW: usize = 48;

fn preview(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max && !text.contains('\n') {
        return first_line.to_string();
    }
    let mut out: String = first_line.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

impl Renderable for RecordRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let r = &self.0;
        writeln!(w, "{}", r.id)?;
        pretty_rule(w)?;
        pretty_kv(w, "Submitted", r.submitted_at.to_rfc3339())?;
        pretty_kv(w, "URL", &r.url)?;
        pretty_kv(w, "Description", &r.description)?;
        pretty_kv(w, "Steps", &r.steps_to_reproduce)?;
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, &self.0)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let r = &self.0;
        writeln!(
            w,
            "{}  {}  {}  {}",
            r.id,
            r.submitted_at.format("%Y-%m-%dT%H:%M:%SZ"),
            r.url,
            preview(&r.description, DESCRIPTION_PREVIEW)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "SUBMITTED", "URL", "DESCRIPTION"]
    }
}

pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let records = match load_records(project_root) {
        Ok(records) => records,
        Err(err) => {
            render_error(output, &CliError::from_code(err.error_code(), err.to_string()))?;
            return Err(err.into());
        }
    };

    let skip = args
        .limit
        .map_or(0, |limit| records.len().saturating_sub(limit));
    let rows: Vec<RecordRow> = records.into_iter().skip(skip).map(RecordRow).collect();

    if rows.is_empty() && !output.is_json() {
        println!("No feedback recorded yet.");
        return Ok(());
    }

    render_list(&rows, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_keeps_short_text() {
        assert_eq!(preview("short", 10), "short");
    }

    #[test]
    fn preview_truncates_long_text() {
        assert_eq!(preview("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn preview_marks_multiline_text() {
        assert_eq!(preview("first\nsecond", 40), "first…");
    }

    #[test]
    fn list_on_empty_project_succeeds() {
        let temp = tempfile::tempdir().expect("temp dir");
        run_list(&ListArgs { limit: None }, OutputMode::Text, temp.path())
            .expect("list should succeed");
    }
}
