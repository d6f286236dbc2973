//! Deserialization from workflow-set JSON into typed structs.
//!
//! The main entry point is [`from_workflow_set`], which takes a
//! `&serde_json::Value` and produces a [`WorkflowSet`]. Statements are
//! dispatched on their `stmt` tag; an unknown tag or a missing required
//! field is an error naming the offending workflow, never a placeholder
//! statement.

use crate::types::*;
use std::fmt;

/// Errors during workflow-set JSON deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    /// The document is missing a required top-level field.
    MissingField { field: String },
    /// A workflow body contains a malformed statement.
    WorkflowError { workflow: String, message: String },
    /// The document structure is invalid.
    InvalidSet(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::MissingField { field } => {
                write!(f, "workflow set missing required field: '{}'", field)
            }
            InterchangeError::WorkflowError { workflow, message } => {
                write!(f, "workflow '{}': {}", workflow, message)
            }
            InterchangeError::InvalidSet(msg) => {
                write!(f, "invalid workflow set: {}", msg)
            }
        }
    }
}

impl std::error::Error for InterchangeError {}

/// Deserialize a workflow-set JSON document into typed structs.
pub fn from_workflow_set(doc: &serde_json::Value) -> Result<WorkflowSet, InterchangeError> {
    let format = doc
        .get("format")
        .and_then(|v| v.as_str())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "format".to_string(),
        })?;
    if format != WORKFLOW_SET_FORMAT {
        return Err(InterchangeError::InvalidSet(format!(
            "unsupported format '{}', expected '{}'",
            format, WORKFLOW_SET_FORMAT
        )));
    }

    let version = doc
        .get("version")
        .and_then(|v| v.as_str())
        .unwrap_or(WORKFLOW_SET_VERSION)
        .to_string();

    let mut pairs = Vec::new();
    if let Some(arr) = doc.get("pairs").and_then(|p| p.as_array()) {
        for obj in arr {
            pairs.push(ServicePair {
                initiating: required_str(obj, "<pairs>", "initiating")?,
                responding: required_str(obj, "<pairs>", "responding")?,
            });
        }
    }

    let workflows_arr = doc
        .get("workflows")
        .and_then(|w| w.as_array())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "workflows".to_string(),
        })?;

    let mut workflows = Vec::with_capacity(workflows_arr.len());
    for obj in workflows_arr {
        workflows.push(parse_workflow(obj)?);
    }

    // Duplicate ids would make identity-keyed analysis ambiguous.
    for (i, w) in workflows.iter().enumerate() {
        if workflows[..i].iter().any(|other| other.id == w.id) {
            return Err(InterchangeError::InvalidSet(format!(
                "duplicate workflow id '{}'",
                w.id
            )));
        }
    }

    Ok(WorkflowSet {
        version,
        pairs,
        workflows,
    })
}

fn parse_workflow(obj: &serde_json::Value) -> Result<WorkflowDecl, InterchangeError> {
    let id = obj
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| InterchangeError::InvalidSet("workflow missing 'id' field".to_string()))?
        .to_string();

    let responds_to = obj
        .get("responds_to")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    let description = obj
        .get("description")
        .and_then(|v| v.as_str())
        .map(str::to_owned);

    let is_abstract = obj
        .get("abstract")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let body = if is_abstract {
        Vec::new()
    } else {
        let body_arr = obj
            .get("body")
            .and_then(|b| b.as_array())
            .ok_or_else(|| InterchangeError::WorkflowError {
                workflow: id.clone(),
                message: "missing 'body' array".to_string(),
            })?;
        parse_statements(body_arr, &id)?
    };

    Ok(WorkflowDecl {
        id,
        responds_to,
        description,
        is_abstract,
        body,
    })
}

fn parse_statements(
    arr: &[serde_json::Value],
    workflow: &str,
) -> Result<Vec<RawStatement>, InterchangeError> {
    arr.iter().map(|obj| parse_statement(obj, workflow)).collect()
}

fn parse_statement(
    obj: &serde_json::Value,
    workflow: &str,
) -> Result<RawStatement, InterchangeError> {
    let tag = obj
        .get("stmt")
        .and_then(|t| t.as_str())
        .ok_or_else(|| InterchangeError::WorkflowError {
            workflow: workflow.to_string(),
            message: "statement missing 'stmt' tag".to_string(),
        })?;

    let line = required_u32(obj, workflow, "line")?;

    match tag {
        "send" => Ok(RawStatement::Send {
            line,
            session: required_str(obj, workflow, "session")?,
            payload: required_str(obj, workflow, "payload")?,
        }),
        "receive" => Ok(RawStatement::Receive {
            line,
            session: required_str(obj, workflow, "session")?,
            payload: required_str(obj, workflow, "payload")?,
        }),
        "send_receive" => Ok(RawStatement::SendReceive {
            line,
            session: required_str(obj, workflow, "session")?,
            sent: required_str(obj, workflow, "sent")?,
            received: required_str(obj, workflow, "received")?,
        }),
        "initiate_session" => Ok(RawStatement::InitiateSession {
            line,
            session: required_str(obj, workflow, "session")?,
            party: optional_str(obj, "party"),
        }),
        "call" => Ok(RawStatement::Call {
            line,
            workflow: required_str(obj, workflow, "workflow")?,
            session: optional_str(obj, "session"),
        }),
        "paired_call" => Ok(RawStatement::PairedCall {
            line,
            service: required_str(obj, workflow, "service")?,
            role: parse_role(obj, workflow)?,
            session: optional_str(obj, "session"),
        }),
        "if" => Ok(RawStatement::If {
            line,
            condition: required_str(obj, workflow, "condition")?,
            condition_comm: parse_condition_comm(obj, workflow)?,
            then_body: parse_sub_body(obj, workflow, "then")?,
            else_body: match obj.get("else") {
                Some(serde_json::Value::Array(arr)) => Some(parse_statements(arr, workflow)?),
                Some(serde_json::Value::Null) | None => None,
                Some(_) => {
                    return Err(InterchangeError::WorkflowError {
                        workflow: workflow.to_string(),
                        message: "'else' must be a statement array".to_string(),
                    })
                }
            },
        }),
        "loop" => Ok(RawStatement::Loop {
            line,
            condition: required_str(obj, workflow, "condition")?,
            condition_comm: parse_condition_comm(obj, workflow)?,
            body: parse_sub_body(obj, workflow, "body")?,
        }),
        "break" => Ok(RawStatement::Break { line }),
        "continue" => Ok(RawStatement::Continue { line }),
        "return" => Ok(RawStatement::Return {
            line,
            inner: parse_inner(obj, workflow)?,
        }),
        "throw" => Ok(RawStatement::Throw {
            line,
            inner: parse_inner(obj, workflow)?,
        }),
        "opaque" => Ok(RawStatement::Opaque {
            line,
            text: required_str(obj, workflow, "text")?,
            modifies_session: obj
                .get("modifies_session")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        }),
        other => Err(InterchangeError::WorkflowError {
            workflow: workflow.to_string(),
            message: format!("unknown statement tag '{}'", other),
        }),
    }
}

fn parse_role(
    obj: &serde_json::Value,
    workflow: &str,
) -> Result<Option<RawRole>, InterchangeError> {
    match obj.get("role").and_then(|v| v.as_str()) {
        None => Ok(None),
        Some("initiating") => Ok(Some(RawRole::Initiating)),
        Some("responding") => Ok(Some(RawRole::Responding)),
        Some(other) => Err(InterchangeError::WorkflowError {
            workflow: workflow.to_string(),
            message: format!("unknown paired-call role '{}'", other),
        }),
    }
}

fn parse_condition_comm(
    obj: &serde_json::Value,
    workflow: &str,
) -> Result<Option<Box<RawStatement>>, InterchangeError> {
    match obj.get("condition_comm") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(comm) => {
            let stmt = parse_statement(comm, workflow)?;
            match stmt {
                RawStatement::Send { .. }
                | RawStatement::Receive { .. }
                | RawStatement::SendReceive { .. } => Ok(Some(Box::new(stmt))),
                _ => Err(InterchangeError::WorkflowError {
                    workflow: workflow.to_string(),
                    message: "'condition_comm' must be a send, receive or send_receive"
                        .to_string(),
                }),
            }
        }
    }
}

fn parse_sub_body(
    obj: &serde_json::Value,
    workflow: &str,
    field: &str,
) -> Result<Vec<RawStatement>, InterchangeError> {
    let arr = obj
        .get(field)
        .and_then(|b| b.as_array())
        .ok_or_else(|| InterchangeError::WorkflowError {
            workflow: workflow.to_string(),
            message: format!("missing '{}' statement array", field),
        })?;
    parse_statements(arr, workflow)
}

fn parse_inner(
    obj: &serde_json::Value,
    workflow: &str,
) -> Result<Vec<RawStatement>, InterchangeError> {
    match obj.get("inner") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(arr)) => parse_statements(arr, workflow),
        Some(_) => Err(InterchangeError::WorkflowError {
            workflow: workflow.to_string(),
            message: "'inner' must be a statement array".to_string(),
        }),
    }
}

// ── Field helpers ───────────────────────────────────────────────────

fn required_str(
    obj: &serde_json::Value,
    workflow: &str,
    field: &str,
) -> Result<String, InterchangeError> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| InterchangeError::WorkflowError {
            workflow: workflow.to_string(),
            message: format!("missing '{}' field", field),
        })
}

fn optional_str(obj: &serde_json::Value, field: &str) -> Option<String> {
    obj.get(field).and_then(|v| v.as_str()).map(str::to_owned)
}

fn required_u32(
    obj: &serde_json::Value,
    workflow: &str,
    field: &str,
) -> Result<u32, InterchangeError> {
    obj.get(field)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| InterchangeError::WorkflowError {
            workflow: workflow.to_string(),
            message: format!("missing or invalid '{}' field", field),
        })
}
