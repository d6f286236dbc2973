//! The statement model: one typed, immutable node per source statement.
//!
//! Statements are built once by the [`crate::builder`] and shared by
//! reference afterwards; branches, combinations and matched-pair events
//! all refer to the same instances. Identity (the builder-assigned
//! [`StatementId`]) is what combination de-duplication and link events
//! key on.

use crate::branch::Branch;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

/// Unique identity of a statement within one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StatementId(pub u32);

/// Identity of a workflow procedure, as declared in the workflow set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(s: &str) -> Self {
        WorkflowId(s.to_string())
    }
}

/// Role of a paired sub-procedure call within its service pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PairRole {
    Initiating,
    Responding,
}

/// Whether an early exit leaves the procedure by returning or throwing.
/// Both lock a path the same way; the distinction is kept for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Return,
    Throw,
}

/// The closed set of statement variants the engine distinguishes.
#[derive(Debug)]
pub enum StatementKind {
    /// `session.send(payload)`.
    Send { session: String, payload: String },
    /// `session.receive(payload)`.
    Receive { session: String, payload: String },
    /// `session.sendAndReceive(received, sent)`: half-duplex, acts as a
    /// send then as a receive across two match rounds.
    SendReceive {
        session: String,
        sent: String,
        received: String,
    },
    /// Begin-exchange statement; its presence makes the enclosing
    /// procedure a protocol initiator.
    InitiateSession {
        session: String,
        party: Option<String>,
    },
    /// Plain sub-procedure call, resolved to a workflow in the set.
    /// Whether it is inlined into the caller's paths or self-contained
    /// is decided after the target has been analyzed.
    SubWorkflowCall {
        workflow: WorkflowId,
        session: Option<String>,
    },
    /// Call into one half of a well-known service pair; matches the
    /// complementary half on the other role's side.
    PairedCall {
        service: String,
        role: Option<PairRole>,
        session: Option<String>,
    },
    /// Two-way conditional. A missing `else` arm still contributes an
    /// implicit empty alternative during expansion.
    Branching {
        condition: String,
        condition_comm: Option<Rc<Statement>>,
        then_branch: Branch,
        else_branch: Option<Branch>,
    },
    /// Loop, abstracted to zero or one pass over its body.
    Looping {
        condition: String,
        condition_comm: Option<Rc<Statement>>,
        body: Branch,
    },
    /// `break`.
    BreakLoop,
    /// `continue`.
    ContinueLoop,
    /// `return` or `throw`: unconditionally leaves the procedure.
    MethodExit { exit: ExitKind },
    /// Anything the matcher is blind to but rendering still shows.
    Opaque { modifies_session: bool },
}

/// One source statement: location, display text and typed behavior.
#[derive(Debug)]
pub struct Statement {
    pub id: StatementId,
    pub line: u32,
    pub description: String,
    pub kind: StatementKind,
}

impl Statement {
    /// True for statements eligible for companion matching.
    pub fn is_communication(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::Send { .. }
                | StatementKind::Receive { .. }
                | StatementKind::SendReceive { .. }
                | StatementKind::PairedCall { .. }
        )
    }

    /// True for a `break` marker.
    pub fn is_loop_break(&self) -> bool {
        matches!(self.kind, StatementKind::BreakLoop)
    }

    /// True for a `continue` marker.
    pub fn is_loop_continue(&self) -> bool {
        matches!(self.kind, StatementKind::ContinueLoop)
    }

    /// True for a `return`/`throw` marker.
    pub fn is_method_exit(&self) -> bool {
        matches!(self.kind, StatementKind::MethodExit { .. })
    }

    /// True for a plain sub-procedure call.
    pub fn is_sub_workflow_call(&self) -> bool {
        matches!(self.kind, StatementKind::SubWorkflowCall { .. })
    }

    /// True if executing the statement changes session state.
    pub fn modifies_session(&self) -> bool {
        match self.kind {
            StatementKind::InitiateSession { .. } => true,
            StatementKind::Opaque { modifies_session } => modifies_session,
            _ => false,
        }
    }

    /// The session/target identifier the statement communicates on.
    pub fn session(&self) -> Option<&str> {
        match &self.kind {
            StatementKind::Send { session, .. }
            | StatementKind::Receive { session, .. }
            | StatementKind::SendReceive { session, .. }
            | StatementKind::InitiateSession { session, .. } => Some(session),
            StatementKind::SubWorkflowCall { session, .. }
            | StatementKind::PairedCall { session, .. } => session.as_deref(),
            _ => None,
        }
    }

    /// Nested sub-branches of a composite statement, for recursive
    /// traversal: the condition communication is not included.
    pub fn sub_branches(&self) -> Vec<&Branch> {
        match &self.kind {
            StatementKind::Branching {
                then_branch,
                else_branch,
                ..
            } => {
                let mut branches = vec![then_branch];
                if let Some(e) = else_branch {
                    branches.push(e);
                }
                branches
            }
            StatementKind::Looping { body, .. } => vec![body],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.line, self.description)
    }
}
