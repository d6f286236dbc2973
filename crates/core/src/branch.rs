//! Branch: an ordered, appendable sequence of statements.
//!
//! A branch is one candidate linear path fragment. It is append-only
//! while the builder constructs it; the combination engine only ever
//! clones it. Equality is structural over statement identity, matching
//! how combination de-duplication compares paths.

use crate::statement::{Statement, StatementKind, WorkflowId};
use std::rc::Rc;

/// Ordered sequence of shared statement nodes.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    statements: Vec<Rc<Statement>>,
}

impl Branch {
    pub fn new() -> Self {
        Branch {
            statements: Vec::new(),
        }
    }

    /// Append a single statement.
    pub fn append(&mut self, statement: Rc<Statement>) {
        self.statements.push(statement);
    }

    /// Structurally concatenate another branch onto this one.
    pub fn append_branch(&mut self, other: &Branch) {
        self.statements.extend(other.statements.iter().cloned());
    }

    /// Insert a statement at the front (used when a condition-embedded
    /// communication must run before every alternative of a construct).
    pub fn prepend(&mut self, statement: Rc<Statement>) {
        self.statements.insert(0, statement);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rc<Statement>> {
        self.statements.iter()
    }

    pub fn statements(&self) -> &[Rc<Statement>] {
        &self.statements
    }

    /// Projection to companion-matchable statements only, preserving
    /// order. This is what the protocol matcher actually compares;
    /// equality and de-duplication use the full sequence instead.
    pub fn communication_statements_only(&self) -> Vec<Rc<Statement>> {
        self.statements
            .iter()
            .filter(|s| s.is_communication())
            .cloned()
            .collect()
    }

    /// First begin-exchange statement anywhere in the branch, including
    /// nested sub-branches and condition communications.
    pub fn initiate_statement(&self) -> Option<Rc<Statement>> {
        for stmt in &self.statements {
            if let StatementKind::InitiateSession { .. } = stmt.kind {
                return Some(stmt.clone());
            }
            for sub in stmt.sub_branches() {
                if let Some(found) = sub.initiate_statement() {
                    return Some(found);
                }
            }
        }
        None
    }

    /// All plain sub-procedure call targets in the branch, recursively,
    /// in first-occurrence order without duplicates, with the line of
    /// the first call site.
    pub fn sub_workflow_calls(&self) -> Vec<(WorkflowId, u32)> {
        let mut targets = Vec::new();
        self.collect_sub_workflow_calls(&mut targets);
        targets
    }

    fn collect_sub_workflow_calls(&self, targets: &mut Vec<(WorkflowId, u32)>) {
        for stmt in &self.statements {
            if let StatementKind::SubWorkflowCall { workflow, .. } = &stmt.kind {
                if !targets.iter().any(|(w, _)| w == workflow) {
                    targets.push((workflow.clone(), stmt.line));
                }
            }
            for sub in stmt.sub_branches() {
                sub.collect_sub_workflow_calls(targets);
            }
        }
    }
}

impl PartialEq for Branch {
    /// Same statements (by identity) in the same order.
    fn eq(&self, other: &Self) -> bool {
        self.statements.len() == other.statements.len()
            && self
                .statements
                .iter()
                .zip(other.statements.iter())
                .all(|(a, b)| a.id == b.id)
    }
}

impl Eq for Branch {}

impl<'a> IntoIterator for &'a Branch {
    type Item = &'a Rc<Statement>;
    type IntoIter = std::slice::Iter<'a, Rc<Statement>>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}
