//! Human-readable text rendering of analysis output.

use duplex_analyze::{AnalysisReport, CombinationRow, FindingSeverity, ProtocolOutcome};
use std::fmt::Write;

pub(crate) fn report_text(report: &AnalysisReport) -> String {
    let mut out = String::new();

    for (id, workflow) in &report.workflows {
        let _ = writeln!(out, "workflow {}", id);
        for row in &workflow.statements {
            let _ = writeln!(
                out,
                "  {:>4}  {}{}",
                row.line,
                "    ".repeat(row.depth),
                row.description
            );
        }

        let _ = writeln!(
            out,
            "  paths: {}{}",
            workflow.combination_count,
            if workflow.truncated { " (truncated)" } else { "" }
        );
        if let Some(responder) = &workflow.responder {
            let _ = writeln!(out, "  responder: {}", responder);
        }
        match &workflow.outcome {
            ProtocolOutcome::NotInitiator => {
                let _ = writeln!(out, "  protocol: not an initiator");
            }
            ProtocolOutcome::Valid => {
                let _ = writeln!(out, "  protocol: valid");
            }
            ProtocolOutcome::Invalid { reason } => {
                let _ = writeln!(out, "  protocol: invalid ({})", reason);
            }
        }
        if !workflow.links.is_empty() {
            let _ = writeln!(out, "  links:");
            for link in &workflow.links {
                let _ = writeln!(
                    out,
                    "    {}: {}  <->  {}: {}",
                    link.initiator.line,
                    link.initiator.description,
                    link.responder.line,
                    link.responder.description
                );
            }
        }
        let _ = writeln!(out);
    }

    if !report.findings.is_empty() {
        let _ = writeln!(out, "findings:");
        for finding in &report.findings {
            let _ = writeln!(
                out,
                "  [{}] {}{}",
                severity_label(finding.severity),
                finding
                    .workflow
                    .as_deref()
                    .map(|w| format!("{}: ", w))
                    .unwrap_or_default(),
                finding.message
            );
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(
        out,
        "summary: {} initiator(s), {} valid, {} invalid",
        report.initiator_count, report.valid_count, report.invalid_count
    );

    out
}

pub(crate) fn paths_text(workflow: &str, rows: &[CombinationRow], truncated: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "workflow {}: {} path(s){}",
        workflow,
        rows.len(),
        if truncated { " (truncated)" } else { "" }
    );
    for (index, row) in rows.iter().enumerate() {
        let _ = writeln!(out, "  path {}:", index + 1);
        if row.statements.is_empty() {
            let _ = writeln!(out, "    (no statements)");
        }
        for statement in &row.statements {
            let _ = writeln!(out, "    {:>4}  {}", statement.line, statement.description);
        }
    }

    out
}

fn severity_label(severity: FindingSeverity) -> &'static str {
    match severity {
        FindingSeverity::Info => "info",
        FindingSeverity::Warning => "warning",
        FindingSeverity::Error => "error",
    }
}
