//! Per-procedure analysis orchestration.
//!
//! Each workflow moves through an explicit state machine: unanalyzed,
//! in progress, done or failed. Results are memoized by workflow
//! identity, so procedures reachable through several call paths are
//! analyzed once, and re-entering a workflow that is still in progress
//! is a cycle in the sub-workflow graph, which is fatal for the run.
//! Structural failures stay confined to the failing workflow; its
//! siblings continue.

use crate::combinations::{expand, CombinationSet, ExpansionContext};
use crate::matcher::{self, MatchedPair};
use crate::report::{build_report, AnalysisReport, Finding, ProtocolOutcome};
use duplex_core::{
    Branch, BuildError, BuildWarning, BuiltWorkflow, StatementBuilder, WorkflowId,
};
use duplex_interchange::{InterchangeError, WorkflowSet};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Errors that abort the analysis of a workflow (or, for cycles, the
/// whole run).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// The input document is not a valid workflow set.
    #[error(transparent)]
    Interchange(#[from] InterchangeError),

    /// The workflow body could not be built (structural error,
    /// recovered per workflow).
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A workflow was re-entered before its own analysis completed.
    #[error("cyclic sub-workflow graph: '{id}' is called again before its analysis completed")]
    Cycle { id: String },

    /// A cached result disappeared between analysis and lookup.
    #[error("internal analysis invariant violated: {0}")]
    Internal(String),
}

/// Everything the analysis of one workflow produced. Owned exclusively
/// by the orchestrator's cache; consumers borrow it.
#[derive(Debug)]
pub struct AnalysisResult {
    pub id: WorkflowId,
    pub branch: Branch,
    /// Fully reduced path set: all locks cleared, duplicates removed.
    pub combinations: CombinationSet,
    pub responder: Option<WorkflowId>,
    pub outcome: ProtocolOutcome,
    pub links: Vec<MatchedPair>,
    pub warnings: Vec<BuildWarning>,
}

enum ProcState {
    InProgress,
    Failed(AnalysisError),
    Done(AnalysisResult),
}

/// Orchestrates the analysis of every workflow in a set.
pub struct Analyzer<'a> {
    set: &'a WorkflowSet,
    builder: StatementBuilder<'a>,
    states: HashMap<WorkflowId, ProcState>,
    /// Completion order, for deterministic report assembly.
    order: Vec<WorkflowId>,
}

impl<'a> Analyzer<'a> {
    pub fn new(set: &'a WorkflowSet) -> Self {
        Analyzer {
            set,
            builder: StatementBuilder::new(set),
            states: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Analyze every workflow in declaration order and assemble the
    /// aggregated report. Structural failures become error findings and
    /// analysis continues; a cycle aborts the run.
    pub fn analyze_all(&mut self) -> Result<AnalysisReport, AnalysisError> {
        let ids: Vec<WorkflowId> = self
            .set
            .workflows
            .iter()
            .map(|w| WorkflowId(w.id.clone()))
            .collect();

        let mut findings = Vec::new();
        for id in &ids {
            match self.ensure_analyzed(id) {
                Ok(()) => {}
                Err(err @ AnalysisError::Cycle { .. }) => return Err(err),
                Err(err) => {
                    warn!(workflow = %id, error = %err, "skipping workflow after structural error");
                    findings.push(Finding::structural(id.as_str(), err.to_string()));
                }
            }
        }

        Ok(build_report(self.results(), findings))
    }

    /// The cached result for a workflow, if its analysis completed.
    pub fn result(&self, id: &WorkflowId) -> Option<&AnalysisResult> {
        match self.states.get(id) {
            Some(ProcState::Done(result)) => Some(result),
            _ => None,
        }
    }

    /// All completed results, in completion order.
    pub fn results(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.order.iter().filter_map(|id| self.result(id))
    }

    fn ensure_analyzed(&mut self, id: &WorkflowId) -> Result<(), AnalysisError> {
        match self.states.get(id) {
            Some(ProcState::Done(_)) => return Ok(()),
            Some(ProcState::Failed(err)) => return Err(err.clone()),
            Some(ProcState::InProgress) => {
                return Err(AnalysisError::Cycle { id: id.to_string() });
            }
            None => {}
        }

        self.states.insert(id.clone(), ProcState::InProgress);
        match self.analyze_one(id) {
            Ok(result) => {
                self.order.push(id.clone());
                self.states.insert(id.clone(), ProcState::Done(result));
                Ok(())
            }
            Err(err) => {
                if matches!(err, AnalysisError::Cycle { .. }) {
                    // Fatal for the run; the sentinel has done its job.
                    self.states.remove(id);
                } else {
                    self.states.insert(id.clone(), ProcState::Failed(err.clone()));
                }
                Err(err)
            }
        }
    }

    fn analyze_one(&mut self, id: &WorkflowId) -> Result<AnalysisResult, AnalysisError> {
        debug!(workflow = %id, "analyzing workflow");

        let BuiltWorkflow {
            branch,
            mut warnings,
        } = self.builder.build(id)?;

        // Recursively analyze plain sub-procedure calls. A target that
        // is not itself an initiator is inlined: its communications
        // belong to the caller's session. Initiator targets run their
        // own session and stay opaque here. A target that fails
        // structurally degrades to opaque with a warning.
        let mut inline: HashMap<WorkflowId, CombinationSet> = HashMap::new();
        for (target, line) in branch.sub_workflow_calls() {
            match self.ensure_analyzed(&target) {
                Ok(()) => {
                    if let Some(sub) = self.result(&target) {
                        if matches!(sub.outcome, ProtocolOutcome::NotInitiator) {
                            inline.insert(target.clone(), sub.combinations.clone());
                        } else {
                            debug!(
                                workflow = %id,
                                target = %target,
                                "sub-workflow runs its own session, not inlining"
                            );
                        }
                    }
                }
                Err(err @ AnalysisError::Cycle { .. }) => return Err(err),
                Err(err) => {
                    warn!(
                        workflow = %id,
                        target = %target,
                        error = %err,
                        "sub-workflow analysis failed, treating call as opaque"
                    );
                    warnings.push(BuildWarning {
                        workflow: id.clone(),
                        line,
                        message: format!("sub-workflow '{}' could not be analyzed: {}", target, err),
                    });
                }
            }
        }

        let ctx = ExpansionContext::new(&inline);
        let mut combinations = expand(&branch, &ctx);
        combinations.reduce_terminal();
        debug!(
            workflow = %id,
            combination_count = combinations.len(),
            "expanded execution paths"
        );

        let is_initiator = branch.initiate_statement().is_some();
        let (responder, outcome, links) = if !is_initiator {
            (None, ProtocolOutcome::NotInitiator, Vec::new())
        } else {
            let responder_id = self
                .set
                .responder_of(id.as_str())
                .map(|decl| WorkflowId(decl.id.clone()));
            match responder_id {
                None => {
                    warn!(workflow = %id, "initiator has no responder declared");
                    (
                        None,
                        ProtocolOutcome::Invalid {
                            reason: "no responder workflow declared".to_string(),
                        },
                        Vec::new(),
                    )
                }
                Some(rid) => {
                    self.ensure_analyzed(&rid)?;
                    let responder_result = self.result(&rid).ok_or_else(|| {
                        AnalysisError::Internal(format!(
                            "result for '{}' missing after analysis",
                            rid
                        ))
                    })?;
                    let verdict = matcher::verify(
                        &combinations,
                        &responder_result.combinations,
                        self.builder.pair_table(),
                    );
                    let outcome = if verdict.valid {
                        ProtocolOutcome::Valid
                    } else {
                        ProtocolOutcome::Invalid {
                            reason: "no pair of execution paths exchanges compatible messages"
                                .to_string(),
                        }
                    };
                    (Some(rid), outcome, verdict.links)
                }
            }
        };

        Ok(AnalysisResult {
            id: id.clone(),
            branch,
            combinations,
            responder,
            outcome,
            links,
            warnings,
        })
    }
}
