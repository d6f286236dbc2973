//! Typed structs representing the workflow-set interchange JSON format.
//!
//! A workflow set is the boundary format between a language front end
//! (which parses real workflow source into statement trees) and the
//! duplex analysis engine. The structs here are deliberately plain:
//! classification into the engine's statement model happens later, in
//! duplex-core's builder.

/// The `format` value every workflow-set document must carry.
pub const WORKFLOW_SET_FORMAT: &str = "duplex-workflow-set";
/// Interchange format version (e.g. "1.0").
pub const WORKFLOW_SET_VERSION: &str = "1.0";

/// A declared (initiating, responding) service pair.
///
/// Two paired sub-procedure calls only match if their service kinds form
/// one of these pairs, with the two sides on opposite roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePair {
    pub initiating: String,
    pub responding: String,
}

/// Explicit role annotation on a paired sub-procedure call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawRole {
    Initiating,
    Responding,
}

/// One workflow procedure as declared in the interchange file.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowDecl {
    /// Unique workflow identifier (e.g. "payment.Initiator").
    pub id: String,
    /// Set on responder workflows: the id of the initiator they answer.
    pub responds_to: Option<String>,
    pub description: Option<String>,
    /// True when the front end found only an abstract/unimplemented body.
    /// Such a workflow cannot be analyzed (its `body` is empty).
    pub is_abstract: bool,
    /// Statement sequence of the procedure body, in source order.
    pub body: Vec<RawStatement>,
}

/// A single parsed statement, dispatched by the `stmt` tag.
///
/// Composite statements (`If`, `Loop`) carry their sub-bodies inline;
/// early exits may carry embedded effects in `inner` (e.g. the send in
/// `return session.send(x)`), which the builder desugars.
#[derive(Debug, Clone, PartialEq)]
pub enum RawStatement {
    Send {
        line: u32,
        session: String,
        payload: String,
    },
    Receive {
        line: u32,
        session: String,
        payload: String,
    },
    SendReceive {
        line: u32,
        session: String,
        sent: String,
        received: String,
    },
    InitiateSession {
        line: u32,
        session: String,
        party: Option<String>,
    },
    Call {
        line: u32,
        workflow: String,
        session: Option<String>,
    },
    PairedCall {
        line: u32,
        service: String,
        role: Option<RawRole>,
        session: Option<String>,
    },
    If {
        line: u32,
        condition: String,
        /// A blocking communication evaluated inside the condition
        /// expression, if any (e.g. `if (receive(T) == x)`).
        condition_comm: Option<Box<RawStatement>>,
        then_body: Vec<RawStatement>,
        else_body: Option<Vec<RawStatement>>,
    },
    Loop {
        line: u32,
        condition: String,
        condition_comm: Option<Box<RawStatement>>,
        body: Vec<RawStatement>,
    },
    Break {
        line: u32,
    },
    Continue {
        line: u32,
    },
    Return {
        line: u32,
        inner: Vec<RawStatement>,
    },
    Throw {
        line: u32,
        inner: Vec<RawStatement>,
    },
    Opaque {
        line: u32,
        text: String,
        modifies_session: bool,
    },
}

impl RawStatement {
    /// Source line of the statement.
    pub fn line(&self) -> u32 {
        match self {
            RawStatement::Send { line, .. }
            | RawStatement::Receive { line, .. }
            | RawStatement::SendReceive { line, .. }
            | RawStatement::InitiateSession { line, .. }
            | RawStatement::Call { line, .. }
            | RawStatement::PairedCall { line, .. }
            | RawStatement::If { line, .. }
            | RawStatement::Loop { line, .. }
            | RawStatement::Break { line }
            | RawStatement::Continue { line }
            | RawStatement::Return { line, .. }
            | RawStatement::Throw { line, .. }
            | RawStatement::Opaque { line, .. } => *line,
        }
    }
}

/// Top-level workflow-set document: the pair table plus all workflows.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSet {
    pub version: String,
    pub pairs: Vec<ServicePair>,
    pub workflows: Vec<WorkflowDecl>,
}

impl WorkflowSet {
    /// Look up a workflow declaration by id.
    pub fn workflow(&self, id: &str) -> Option<&WorkflowDecl> {
        self.workflows.iter().find(|w| w.id == id)
    }

    /// Find the responder declared for an initiator workflow, if any.
    pub fn responder_of(&self, initiator_id: &str) -> Option<&WorkflowDecl> {
        self.workflows
            .iter()
            .find(|w| w.responds_to.as_deref() == Some(initiator_id))
    }
}
