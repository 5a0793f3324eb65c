//! Run summary → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): one line per scenario, then the failure log
//! - **JSON** (`--json`): the whole summary via `serde_json::to_string_pretty`

use stress_core::HarnessError;
use stress_harness::{PassOutcome, RunSummary};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format a finished run.
pub fn format_summary(summary: &RunSummary, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(summary)
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputMode::Human => format_human(summary),
    }
}

/// Format a harness error.
pub fn format_error(err: &HarnessError, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&serde_json::json!({
            "error": err.to_string()
        }))
        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err)),
        OutputMode::Human => format!("(error) {}", err),
    }
}

fn format_human(summary: &RunSummary) -> String {
    let mut lines = Vec::new();
    for pass in &summary.passes {
        lines.push(format!("Pass #{} (seed {})", pass.pass, pass.seed_base));
        lines.extend(format_pass(pass));
    }

    let failures = summary.failures();
    if !failures.is_empty() {
        lines.push(String::new());
        lines.push(format!("{} failure(s):", failures.len()));
        for (scenario, failure) in failures {
            lines.push(format!(
                "  [{}] {} {} during {}: {}",
                scenario,
                failure.worker,
                failure.kind,
                failure.operation.as_deref().unwrap_or("-"),
                failure.message
            ));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "{}: {} of {} pass(es) run",
        if summary.is_success() { "PASS" } else { "FAIL" },
        summary.passes.len(),
        summary.requested
    ));
    lines.join("\n")
}

fn format_pass(pass: &PassOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(report) = &pass.contention {
        lines.push(format!(
            "  contention: {} ({} ops, {} tolerated, {} ms)",
            status(report.verdict.is_success()),
            report.operations,
            report.tolerated,
            report.elapsed.as_millis()
        ));
    }
    if let Some(report) = &pass.shutdown {
        if report.skipped {
            lines.push("  shutdown: skipped (in-memory store)".to_string());
        } else {
            lines.push(format!(
                "  shutdown: {} (surviving ids {:?}, {} tolerated)",
                status(report.verdict.is_success()),
                report.surviving_ids,
                report.tolerated.len()
            ));
        }
    }
    lines
}

fn status(success: bool) -> &'static str {
    if success {
        "ok"
    } else {
        "FAILED"
    }
}
