//! Run summary and its text and JSON renderings.
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::{EXIT_FAILURE, EXIT_OK},
    reconciler::{ApplyResult, Outcome},
};

/// Outcome counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub created: usize,
    pub already_exists: usize,
    pub failed: usize,
}

impl RunSummary {
    /// Process exit code: success only when nothing failed.
    pub const fn exit_code(&self) -> i32 {
        if self.failed == 0 { EXIT_OK } else { EXIT_FAILURE }
    }

    /// Whether every monitor was created or already present.
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Count the outcomes in `results`.
pub fn summarize(results: &[ApplyResult]) -> RunSummary {
    results.iter().fold(RunSummary { total: results.len(), ..Default::default() }, |mut acc, r| {
        match r.outcome() {
            Outcome::Created => acc.created += 1,
            Outcome::AlreadyExists => acc.already_exists += 1,
            Outcome::Failed => acc.failed += 1,
        }
        acc
    })
}

/// Write one line per result followed by a totals line.
pub fn render_text<W: Write>(
    results: &[ApplyResult],
    summary: &RunSummary,
    out: &mut W,
) -> io::Result<()> {
    for result in results {
        let spec = result.spec();
        writeln!(
            out,
            "{:<7} {} ({}) {}",
            result.outcome().code(),
            spec.name,
            spec.kind,
            result.detail()
        )?;
    }
    writeln!(
        out,
        "{} monitors: {} created, {} already present, {} failed",
        summary.total, summary.created, summary.already_exists, summary.failed
    )
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    summary: &'a RunSummary,
    results: &'a [ApplyResult],
}

/// Write the results and summary as a single pretty-printed JSON document.
pub fn render_json<W: Write>(
    results: &[ApplyResult],
    summary: &RunSummary,
    out: &mut W,
) -> io::Result<()> {
    let report = JsonReport { generated_at: Utc::now(), summary, results };
    serde_json::to_writer_pretty(&mut *out, &report)?;
    writeln!(out)
}
