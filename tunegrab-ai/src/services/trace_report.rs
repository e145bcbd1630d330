//! Human readable rendering of score traces
//!
//! Plain-text tables for the terminal and a standalone HTML page listing
//! every evaluated candidate of a selection round.

use crate::services::naming::slugify;
use crate::services::scorer::ScoreTrace;
use crate::services::selector::CandidateEvaluation;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// File stem used when a round produced no match
pub const NO_MATCH_SLUG: &str = "no-match-found";

/// Fixed-width `Step | Description | Change | Score` table
pub fn format_trace_table(trace: &ScoreTrace) -> String {
    let header = format!(
        "{:<6} | {:<50} | {:<15} | {:<10}",
        "Step", "Description", "Change", "Score"
    );
    let mut out = String::new();
    out.push_str(&header);
    out.push('\n');
    out.push_str(&"-".repeat(header.len()));

    for (idx, step) in trace.steps().iter().enumerate() {
        let _ = write!(
            out,
            "\n{:<6} | {:<50} | {:<15} | {:<10.2}",
            idx + 1,
            step.description,
            format_delta(step.delta),
            step.total
        );
    }
    out
}

fn format_delta(delta: f64) -> String {
    format!("{:+.2}", delta)
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Trace as an HTML table
pub fn format_trace_html(trace: &ScoreTrace) -> String {
    let mut out = String::from(
        "<table border='1' cellpadding='5' cellspacing='0'>\n\
         <thead><tr><th>Step</th><th>Description</th><th>Change</th><th>Score</th></tr></thead>\n\
         <tbody>",
    );
    for (idx, step) in trace.steps().iter().enumerate() {
        let _ = write!(
            out,
            "\n<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td></tr>",
            idx + 1,
            escape_html(&step.description),
            format_delta(step.delta),
            step.total
        );
    }
    out.push_str("\n</tbody></table>");
    out
}

/// One HTML page covering every evaluated candidate
pub fn render_html_report(
    query: &str,
    evaluations: &[CandidateEvaluation],
    best_title: Option<&str>,
) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<html><head><meta charset='UTF-8'><title>Score report</title></head><body>\n\
         <h1>Score report for '{}'</h1>\n<p>Selected: {}</p>",
        escape_html(query),
        escape_html(best_title.unwrap_or("no match found"))
    );

    for evaluation in evaluations {
        let data = serde_json::to_string_pretty(&evaluation.candidate)
            .unwrap_or_else(|e| format!("unserializable candidate: {}", e));
        let _ = write!(
            out,
            "\n<hr>\n<h2>Video ID: {} - Score: {:.2}</h2>\n<h3>Candidate data:</h3>\n<pre>{}</pre>\n<h3>Score steps:</h3>\n{}",
            escape_html(&evaluation.candidate.id),
            evaluation.outcome.score,
            escape_html(&data),
            format_trace_html(&evaluation.outcome.trace)
        );
    }

    out.push_str("\n</body></html>\n");
    out
}

/// Write the HTML report to `<dir>/<slug of best title>.html`
pub async fn write_debug_report(
    dir: &Path,
    query: &str,
    evaluations: &[CandidateEvaluation],
    best_title: Option<&str>,
) -> std::io::Result<PathBuf> {
    let slug = best_title.map(slugify).filter(|s| !s.is_empty());
    let file_name = format!("{}.html", slug.as_deref().unwrap_or(NO_MATCH_SLUG));
    let path = dir.join(file_name);

    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(&path, render_html_report(query, evaluations, best_title)).await?;

    tracing::info!(path = %path.display(), "Wrote score report");
    Ok(path)
}
