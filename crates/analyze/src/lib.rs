//! duplex-analyze: path expansion, protocol matching and orchestration.
//!
//! The analyzer consumes workflow-set interchange JSON (via
//! duplex-interchange and duplex-core) and decides, per initiator
//! workflow, whether its message exchange with the declared responder
//! is compatible across every feasible control-flow path.
//!
//! The pieces:
//!
//! - [`combinations`]: expands a branch into the set of all
//!   distinguishable linear execution paths, with early-exit locking
//!   and scope-exit reduction
//! - [`matcher`]: queue-based companion matching between an
//!   initiator's and a responder's path sets
//! - [`orchestrator`]: per-workflow state machine, identity-keyed
//!   memoization, sub-workflow recursion and cycle detection
//! - [`report`]: the aggregated, serializable analysis report
//!
//! [`analyze()`] runs the whole pipeline on a JSON document.

pub mod combinations;
pub mod matcher;
pub mod orchestrator;
pub mod report;

pub use combinations::{
    expand, Combination, CombinationSet, ExpansionContext, LockStatus, MAX_COMBINATIONS,
};
pub use matcher::{verify, LinkEndpoint, MatchedPair, ProtocolMatch};
pub use orchestrator::{AnalysisError, AnalysisResult, Analyzer};
pub use report::{
    build_report, combination_rows, statement_rows, AnalysisReport, CombinationRow, Finding,
    FindingSeverity, ProtocolOutcome, StatementRow, WorkflowReport,
};

/// Run the full analysis pipeline on a workflow-set JSON document.
///
/// Deserializes the document, analyzes every workflow (recursing
/// through sub-workflow calls), verifies every initiator against its
/// responder and returns the aggregated report.
pub fn analyze(doc: &serde_json::Value) -> Result<AnalysisReport, AnalysisError> {
    let set = duplex_interchange::from_workflow_set(doc)?;
    let mut analyzer = Analyzer::new(&set);
    analyzer.analyze_all()
}
