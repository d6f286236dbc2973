//! Lowering from interchange workflow declarations into branches of
//! typed statements.
//!
//! The builder classifies every raw statement into exactly one
//! [`StatementKind`], assigns run-unique statement ids, and desugars
//! early exits with embedded effects (`return session.send(x)`) into
//! the effects followed by a pure marker, so the combination engine
//! only ever sees pure early-exit statements.

use crate::branch::Branch;
use crate::companion::PairTable;
use crate::error::BuildError;
use crate::statement::{ExitKind, Statement, StatementId, StatementKind, WorkflowId};
use duplex_interchange::{RawRole, RawStatement, WorkflowSet};
use std::rc::Rc;
use tracing::{debug, warn};

/// A non-fatal defect noticed while building a procedure body.
#[derive(Debug, Clone)]
pub struct BuildWarning {
    pub workflow: WorkflowId,
    pub line: u32,
    pub message: String,
}

/// The built branch for one procedure, with any degradation warnings.
#[derive(Debug)]
pub struct BuiltWorkflow {
    pub branch: Branch,
    pub warnings: Vec<BuildWarning>,
}

/// Builds statement models for the workflows of one workflow set.
///
/// One builder serves a whole analysis run, so statement ids are unique
/// across every procedure it builds.
pub struct StatementBuilder<'a> {
    set: &'a WorkflowSet,
    pairs: PairTable,
    next_id: u32,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(set: &'a WorkflowSet) -> Self {
        StatementBuilder {
            set,
            pairs: PairTable::from_pairs(&set.pairs),
            next_id: 0,
        }
    }

    /// The service-pair table declared by the workflow set.
    pub fn pair_table(&self) -> &PairTable {
        &self.pairs
    }

    /// Build the branch for one procedure body.
    pub fn build(&mut self, id: &WorkflowId) -> Result<BuiltWorkflow, BuildError> {
        let decl = self
            .set
            .workflow(id.as_str())
            .ok_or_else(|| BuildError::UnknownWorkflow {
                id: id.to_string(),
            })?;

        if decl.is_abstract {
            return Err(BuildError::AbstractBody { id: id.to_string() });
        }

        debug!(workflow = %id, statements = decl.body.len(), "building statement model");

        let mut warnings = Vec::new();
        let branch = self.build_branch(&decl.body, id, &mut warnings);
        Ok(BuiltWorkflow { branch, warnings })
    }

    fn build_branch(
        &mut self,
        raws: &[RawStatement],
        workflow: &WorkflowId,
        warnings: &mut Vec<BuildWarning>,
    ) -> Branch {
        let mut branch = Branch::new();
        for raw in raws {
            self.lower_into(raw, workflow, warnings, &mut branch);
        }
        branch
    }

    /// Lower one raw statement, appending one or more model statements.
    fn lower_into(
        &mut self,
        raw: &RawStatement,
        workflow: &WorkflowId,
        warnings: &mut Vec<BuildWarning>,
        out: &mut Branch,
    ) {
        match raw {
            RawStatement::Send {
                line,
                session,
                payload,
            } => out.append(self.make(
                *line,
                format!("{}.send({})", session, payload),
                StatementKind::Send {
                    session: session.clone(),
                    payload: payload.clone(),
                },
            )),
            RawStatement::Receive {
                line,
                session,
                payload,
            } => out.append(self.make(
                *line,
                format!("{}.receive({})", session, payload),
                StatementKind::Receive {
                    session: session.clone(),
                    payload: payload.clone(),
                },
            )),
            RawStatement::SendReceive {
                line,
                session,
                sent,
                received,
            } => out.append(self.make(
                *line,
                format!("{}.sendAndReceive({}, {})", session, received, sent),
                StatementKind::SendReceive {
                    session: session.clone(),
                    sent: sent.clone(),
                    received: received.clone(),
                },
            )),
            RawStatement::InitiateSession {
                line,
                session,
                party,
            } => out.append(self.make(
                *line,
                format!(
                    "{} = initiateSession({})",
                    session,
                    party.as_deref().unwrap_or("party")
                ),
                StatementKind::InitiateSession {
                    session: session.clone(),
                    party: party.clone(),
                },
            )),
            RawStatement::Call {
                line,
                workflow: target,
                session,
            } => {
                if self.set.workflow(target).is_some() {
                    out.append(self.make(
                        *line,
                        format!("call {}", target),
                        StatementKind::SubWorkflowCall {
                            workflow: WorkflowId(target.clone()),
                            session: session.clone(),
                        },
                    ));
                } else {
                    // An unresolvable target must not abort the whole
                    // analysis; the call degrades to an opaque statement.
                    warn!(
                        workflow = %workflow,
                        target = %target,
                        line,
                        "sub-workflow target not in set, treating call as opaque"
                    );
                    warnings.push(BuildWarning {
                        workflow: workflow.clone(),
                        line: *line,
                        message: format!("cannot resolve sub-workflow '{}'", target),
                    });
                    out.append(self.make(
                        *line,
                        format!("call {} (unresolved)", target),
                        StatementKind::Opaque {
                            modifies_session: false,
                        },
                    ));
                }
            }
            RawStatement::PairedCall {
                line,
                service,
                role,
                session,
            } => {
                let role = match role {
                    Some(RawRole::Initiating) => Some(crate::statement::PairRole::Initiating),
                    Some(RawRole::Responding) => Some(crate::statement::PairRole::Responding),
                    None => self.pairs.role_of(service),
                };
                out.append(self.make(
                    *line,
                    format!("call {}", service),
                    StatementKind::PairedCall {
                        service: service.clone(),
                        role,
                        session: session.clone(),
                    },
                ));
            }
            RawStatement::If {
                line,
                condition,
                condition_comm,
                then_body,
                else_body,
            } => {
                let condition_comm = condition_comm
                    .as_deref()
                    .map(|c| self.lower_condition_comm(c, workflow, warnings));
                let then_branch = self.build_branch(then_body, workflow, warnings);
                let else_branch = else_body
                    .as_deref()
                    .map(|b| self.build_branch(b, workflow, warnings));
                out.append(self.make(
                    *line,
                    format!("if ({})", condition),
                    StatementKind::Branching {
                        condition: condition.clone(),
                        condition_comm,
                        then_branch,
                        else_branch,
                    },
                ));
            }
            RawStatement::Loop {
                line,
                condition,
                condition_comm,
                body,
            } => {
                let condition_comm = condition_comm
                    .as_deref()
                    .map(|c| self.lower_condition_comm(c, workflow, warnings));
                let body = self.build_branch(body, workflow, warnings);
                out.append(self.make(
                    *line,
                    format!("while ({})", condition),
                    StatementKind::Looping {
                        condition: condition.clone(),
                        condition_comm,
                        body,
                    },
                ));
            }
            RawStatement::Break { line } => {
                out.append(self.make(*line, "break".to_string(), StatementKind::BreakLoop))
            }
            RawStatement::Continue { line } => out.append(self.make(
                *line,
                "continue".to_string(),
                StatementKind::ContinueLoop,
            )),
            RawStatement::Return { line, inner } => {
                // Effects embedded in the return expression run before
                // the procedure exits; hoist them ahead of the marker.
                for effect in inner {
                    self.lower_into(effect, workflow, warnings, out);
                }
                out.append(self.make(
                    *line,
                    "return".to_string(),
                    StatementKind::MethodExit {
                        exit: ExitKind::Return,
                    },
                ));
            }
            RawStatement::Throw { line, inner } => {
                for effect in inner {
                    self.lower_into(effect, workflow, warnings, out);
                }
                out.append(self.make(
                    *line,
                    "throw".to_string(),
                    StatementKind::MethodExit {
                        exit: ExitKind::Throw,
                    },
                ));
            }
            RawStatement::Opaque {
                line,
                text,
                modifies_session,
            } => out.append(self.make(
                *line,
                text.clone(),
                StatementKind::Opaque {
                    modifies_session: *modifies_session,
                },
            )),
        }
    }

    /// Lower the communication embedded in a condition expression. The
    /// interchange layer has already restricted it to send / receive /
    /// sendAndReceive, so lowering it yields exactly one statement.
    fn lower_condition_comm(
        &mut self,
        raw: &RawStatement,
        workflow: &WorkflowId,
        warnings: &mut Vec<BuildWarning>,
    ) -> Rc<Statement> {
        let mut single = Branch::new();
        self.lower_into(raw, workflow, warnings, &mut single);
        // One comm raw lowers to one statement; fall back to an opaque
        // node if that invariant is ever relaxed upstream.
        single.statements().first().cloned().unwrap_or_else(|| {
            self.make(
                raw.line(),
                "<condition>".to_string(),
                StatementKind::Opaque {
                    modifies_session: false,
                },
            )
        })
    }

    fn make(&mut self, line: u32, description: String, kind: StatementKind) -> Rc<Statement> {
        let id = StatementId(self.next_id);
        self.next_id += 1;
        Rc::new(Statement {
            id,
            line,
            description,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplex_interchange::from_workflow_set;

    fn build_set(doc: serde_json::Value) -> WorkflowSet {
        from_workflow_set(&doc).unwrap()
    }

    #[test]
    fn test_return_with_inner_is_desugared() {
        let set = build_set(serde_json::json!({
            "format": "duplex-workflow-set",
            "workflows": [{
                "id": "w",
                "body": [
                    {"stmt": "return", "line": 9, "inner": [
                        {"stmt": "send", "line": 9, "session": "s", "payload": "Ack"}
                    ]}
                ]
            }]
        }));

        let mut builder = StatementBuilder::new(&set);
        let built = builder.build(&WorkflowId::from("w")).unwrap();

        assert_eq!(built.branch.len(), 2);
        assert!(built.branch.statements()[0].is_communication());
        assert!(built.branch.statements()[1].is_method_exit());
    }

    #[test]
    fn test_unresolved_call_degrades_to_opaque() {
        let set = build_set(serde_json::json!({
            "format": "duplex-workflow-set",
            "workflows": [{
                "id": "w",
                "body": [
                    {"stmt": "call", "line": 3, "workflow": "vendor.Mystery"}
                ]
            }]
        }));

        let mut builder = StatementBuilder::new(&set);
        let built = builder.build(&WorkflowId::from("w")).unwrap();

        assert_eq!(built.warnings.len(), 1);
        assert!(built.warnings[0].message.contains("vendor.Mystery"));
        let stmt = &built.branch.statements()[0];
        assert!(!stmt.is_sub_workflow_call());
        assert!(!stmt.is_communication());
    }

    #[test]
    fn test_paired_call_role_inferred_from_table() {
        let set = build_set(serde_json::json!({
            "format": "duplex-workflow-set",
            "pairs": [{"initiating": "CollectSignatures", "responding": "SignTransaction"}],
            "workflows": [{
                "id": "w",
                "body": [
                    {"stmt": "paired_call", "line": 3, "service": "SignTransaction"}
                ]
            }]
        }));

        let mut builder = StatementBuilder::new(&set);
        let built = builder.build(&WorkflowId::from("w")).unwrap();

        match &built.branch.statements()[0].kind {
            StatementKind::PairedCall { role, .. } => {
                assert_eq!(*role, Some(crate::statement::PairRole::Responding));
            }
            other => panic!("expected paired call, got {:?}", other),
        }
    }

    #[test]
    fn test_opaque_statement_keeps_session_state_flag() {
        let set = build_set(serde_json::json!({
            "format": "duplex-workflow-set",
            "workflows": [{
                "id": "w",
                "body": [
                    {"stmt": "opaque", "line": 2, "text": "sessions.put(name, s)",
                     "modifies_session": true},
                    {"stmt": "opaque", "line": 3, "text": "total += amount"}
                ]
            }]
        }));

        let mut builder = StatementBuilder::new(&set);
        let built = builder.build(&WorkflowId::from("w")).unwrap();

        assert!(built.branch.statements()[0].modifies_session());
        assert!(!built.branch.statements()[1].modifies_session());
    }

    #[test]
    fn test_abstract_body_is_a_build_error() {
        let set = build_set(serde_json::json!({
            "format": "duplex-workflow-set",
            "workflows": [{"id": "w", "abstract": true}]
        }));

        let mut builder = StatementBuilder::new(&set);
        let err = builder.build(&WorkflowId::from("w")).unwrap_err();
        assert_eq!(err, BuildError::AbstractBody {
            id: "w".to_string()
        });
    }

    #[test]
    fn test_unknown_workflow_is_a_build_error() {
        let set = build_set(serde_json::json!({
            "format": "duplex-workflow-set",
            "workflows": []
        }));

        let mut builder = StatementBuilder::new(&set);
        let err = builder.build(&WorkflowId::from("ghost")).unwrap_err();
        assert_eq!(err, BuildError::UnknownWorkflow {
            id: "ghost".to_string()
        });
    }

    #[test]
    fn test_ids_are_unique_across_workflows() {
        let set = build_set(serde_json::json!({
            "format": "duplex-workflow-set",
            "workflows": [
                {"id": "a", "body": [
                    {"stmt": "send", "line": 1, "session": "s", "payload": "T"}
                ]},
                {"id": "b", "body": [
                    {"stmt": "receive", "line": 1, "session": "s", "payload": "T"}
                ]}
            ]
        }));

        let mut builder = StatementBuilder::new(&set);
        let a = builder.build(&WorkflowId::from("a")).unwrap();
        let b = builder.build(&WorkflowId::from("b")).unwrap();

        assert_ne!(
            a.branch.statements()[0].id,
            b.branch.statements()[0].id
        );
    }
}
