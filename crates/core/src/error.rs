/// Errors raised while building the statement model for a procedure.
///
/// Both variants are structural: the procedure itself cannot be
/// analyzed. Unresolvable sub-procedure *calls* are not errors; the
/// builder degrades them to opaque statements and reports a warning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The requested workflow id is not declared in the workflow set.
    #[error("workflow '{id}' is not declared in the workflow set")]
    UnknownWorkflow { id: String },

    /// The workflow declares only an abstract/unimplemented body.
    #[error("workflow '{id}' has only an abstract body and cannot be analyzed")]
    AbstractBody { id: String },
}
