//! Human-readable rendering of run summaries, query results and health checks.

use std::fmt::Write;

use dbcopy::{Dialect, QueryOutput, RunStatus, RunSummary};
use serde::Serialize;

/// Liveness result for one endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub endpoint: String,
    pub dialect: Option<Dialect>,
    pub healthy: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn format_summary(summary: &RunSummary) -> String {
    let status = match summary.status {
        RunStatus::Completed => "Copy completed!",
        RunStatus::PartialFailure => "Copy completed with failures",
        RunStatus::Cancelled => "Copy cancelled",
    };

    let mut out = String::new();
    let _ = writeln!(out, "\n{}", status);
    let _ = writeln!(out, "  Run ID: {}", summary.run_id);
    let _ = writeln!(
        out,
        "  {} ({}) -> {} ({})",
        summary.source, summary.source_dialect, summary.destination, summary.dest_dialect
    );
    let _ = writeln!(out, "  Duration: {:.2}s", summary.duration_seconds);
    let _ = writeln!(
        out,
        "  Objects: {}/{}",
        summary.objects_succeeded, summary.objects_total
    );
    for batch in &summary.batches {
        let _ = writeln!(
            out,
            "    {}.{}: {}/{}",
            batch.schema,
            batch.kind,
            batch.succeeded(),
            batch.total()
        );
    }
    if !summary.failed_objects.is_empty() {
        let _ = writeln!(out, "  Failed objects:");
        for f in &summary.failed_objects {
            let _ = writeln!(out, "    {}.{} ({}): {}", f.schema, f.name, f.kind, f.error);
        }
    }
    out
}

/// Left-justified columns padded to the widest value, separated by `;`.
pub fn format_query(result: &QueryOutput) -> String {
    let cells: Vec<Vec<&str>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|c| c.as_deref().unwrap_or("NULL")).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    let header: Vec<&str> = result.columns.iter().map(String::as_str).collect();
    push_line(&mut out, &header, &widths);
    for row in &cells {
        push_line(&mut out, row, &widths);
    }
    out
}

fn push_line(out: &mut String, cells: &[&str], widths: &[usize]) {
    let line = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| format!("{:<width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
        .collect::<Vec<_>>()
        .join(";");
    out.push_str(&line);
    out.push('\n');
}

pub fn format_health(reports: &[HealthReport]) -> String {
    let mut out = String::from("Health Check Results:\n");
    for r in reports {
        let dialect = r.dialect.map(|d| d.to_string()).unwrap_or_else(|| "?".into());
        let _ = writeln!(
            out,
            "  {} ({}): {} ({}ms)",
            r.endpoint,
            dialect,
            if r.healthy { "OK" } else { "FAILED" },
            r.latency_ms
        );
        if let Some(err) = &r.error {
            let _ = writeln!(out, "    Error: {}", err);
        }
    }
    let healthy = reports.iter().all(|r| r.healthy);
    let _ = writeln!(
        out,
        "\n  Overall: {}",
        if healthy { "HEALTHY" } else { "UNHEALTHY" }
    );
    out
}
