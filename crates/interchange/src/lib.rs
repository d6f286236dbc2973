//! duplex-interchange: workflow-set interchange JSON types and deserialization.
//!
//! Provides typed structs for workflow-set documents (the format in which
//! a language front end hands parsed procedure bodies to the analysis
//! engine) and a single [`from_workflow_set()`] entry point that
//! deserializes a `serde_json::Value` document into a [`WorkflowSet`].
//!
//! duplex-core consumes these types to build its statement model; this
//! crate performs no classification beyond tag dispatch.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_workflow_set, InterchangeError};
pub use types::*;
