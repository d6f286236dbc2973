//! Aggregated analysis report: everything the rendering and reporting
//! side needs, with notable findings extracted for summary display.

use crate::combinations::CombinationSet;
use crate::matcher::MatchedPair;
use crate::orchestrator::AnalysisResult;
use duplex_core::{Branch, StatementKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// Severity level for an analysis finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FindingSeverity {
    Info,
    Warning,
    Error,
}

/// A notable finding from analysis.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub workflow: Option<String>,
    pub severity: FindingSeverity,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

/// Protocol verdict for one workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProtocolOutcome {
    /// The workflow never begins an exchange; there is nothing to check.
    NotInitiator,
    /// Some legal execution paths of initiator and responder line up.
    Valid,
    /// No initiator path is compatible with any responder path.
    Invalid { reason: String },
}

/// One row of the line-by-line statement listing.
#[derive(Debug, Clone, Serialize)]
pub struct StatementRow {
    pub line: u32,
    pub depth: usize,
    pub description: String,
}

/// Report for a single analyzed workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub id: String,
    pub statements: Vec<StatementRow>,
    pub combination_count: usize,
    pub truncated: bool,
    pub responder: Option<String>,
    pub outcome: ProtocolOutcome,
    pub links: Vec<MatchedPair>,
}

/// Aggregated report across all workflows of one analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Keyed by workflow id for deterministic output ordering.
    pub workflows: BTreeMap<String, WorkflowReport>,
    pub findings: Vec<Finding>,
    pub initiator_count: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
}

impl AnalysisReport {
    /// True when every checked protocol verified and nothing failed
    /// structurally.
    pub fn all_valid(&self) -> bool {
        self.invalid_count == 0
            && !self
                .findings
                .iter()
                .any(|f| f.severity == FindingSeverity::Error)
    }
}

impl Finding {
    /// A per-workflow structural failure (skip-and-continue).
    pub fn structural(workflow: &str, message: String) -> Self {
        Finding {
            workflow: Some(workflow.to_string()),
            severity: FindingSeverity::Error,
            message,
            details: None,
        }
    }
}

/// Assemble the aggregated report from per-workflow results plus any
/// structural findings collected by the orchestrator.
pub fn build_report<'r>(
    results: impl Iterator<Item = &'r AnalysisResult>,
    mut findings: Vec<Finding>,
) -> AnalysisReport {
    let mut workflows = BTreeMap::new();
    let mut initiator_count = 0;
    let mut valid_count = 0;
    let mut invalid_count = 0;

    for result in results {
        let id = result.id.to_string();

        for warning in &result.warnings {
            findings.push(Finding {
                workflow: Some(warning.workflow.to_string()),
                severity: FindingSeverity::Warning,
                message: warning.message.clone(),
                details: Some(serde_json::json!({ "line": warning.line })),
            });
        }

        if result.combinations.truncated() {
            findings.push(Finding {
                workflow: Some(id.clone()),
                severity: FindingSeverity::Warning,
                message: format!(
                    "path expansion truncated at {} combinations",
                    result.combinations.len()
                ),
                details: Some(serde_json::json!({
                    "combination_count": result.combinations.len(),
                })),
            });
        }

        match &result.outcome {
            ProtocolOutcome::NotInitiator => {}
            ProtocolOutcome::Valid => {
                initiator_count += 1;
                valid_count += 1;
            }
            ProtocolOutcome::Invalid { reason } => {
                initiator_count += 1;
                invalid_count += 1;
                findings.push(Finding {
                    workflow: Some(id.clone()),
                    severity: FindingSeverity::Warning,
                    message: format!("protocol invalid: {}", reason),
                    details: result
                        .responder
                        .as_ref()
                        .map(|r| serde_json::json!({ "responder": r.to_string() })),
                });
            }
        }

        workflows.insert(id.clone(), WorkflowReport {
            id,
            statements: statement_rows(&result.branch),
            combination_count: result.combinations.len(),
            truncated: result.combinations.truncated(),
            responder: result.responder.as_ref().map(|r| r.to_string()),
            outcome: result.outcome.clone(),
            links: result.links.clone(),
        });
    }

    AnalysisReport {
        workflows,
        findings,
        initiator_count,
        valid_count,
        invalid_count,
    }
}

/// Flatten a branch into display rows, indenting nested sub-branches.
pub fn statement_rows(branch: &Branch) -> Vec<StatementRow> {
    let mut rows = Vec::new();
    collect_rows(branch, 0, &mut rows);
    rows
}

fn collect_rows(branch: &Branch, depth: usize, rows: &mut Vec<StatementRow>) {
    for statement in branch {
        rows.push(StatementRow {
            line: statement.line,
            depth,
            description: statement.description.clone(),
        });
        if let StatementKind::Branching {
            else_branch: Some(else_branch),
            then_branch,
            ..
        } = &statement.kind
        {
            collect_rows(then_branch, depth + 1, rows);
            rows.push(StatementRow {
                line: statement.line,
                depth,
                description: "else".to_string(),
            });
            collect_rows(else_branch, depth + 1, rows);
        } else {
            for sub in statement.sub_branches() {
                collect_rows(sub, depth + 1, rows);
            }
        }
    }
}

/// Serializable view of one expanded combination, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct CombinationRow {
    pub lock: crate::combinations::LockStatus,
    pub statements: Vec<StatementRow>,
}

/// Describe every combination in a set, in set order.
pub fn combination_rows(set: &CombinationSet) -> Vec<CombinationRow> {
    set.iter()
        .map(|c| CombinationRow {
            lock: c.lock(),
            statements: c
                .statements()
                .iter()
                .map(|s| StatementRow {
                    line: s.line,
                    depth: 0,
                    description: s.description.clone(),
                })
                .collect(),
        })
        .collect()
}
