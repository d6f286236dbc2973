//! duplex-core: statement model, branches and the workflow builder.
//!
//! Provides the data model the analysis engine runs on:
//!
//! - [`Statement`] / [`StatementKind`]: one typed, immutable node per
//!   source statement, with the capability predicates and companion
//!   matching behavior the engine needs
//! - [`Branch`]: an ordered, appendable statement sequence with the
//!   communication-only projection the protocol matcher compares
//! - [`StatementBuilder`]: lowering from interchange workflow
//!   declarations into branches, with early-exit desugaring and
//!   degradation of unresolvable sub-workflow calls
//! - [`companion`]: the companion-acceptance rules, including
//!   half-duplex phase handling for `sendAndReceive`
//!
//! The crate performs no path expansion or matching itself; that lives
//! in duplex-analyze.

pub mod branch;
pub mod builder;
pub mod companion;
pub mod error;
pub mod statement;

pub use branch::Branch;
pub use builder::{BuildWarning, BuiltWorkflow, StatementBuilder};
pub use companion::{accepts_companion, consumed_after_match, HalfDuplex, PairTable};
pub use error::BuildError;
pub use statement::{ExitKind, PairRole, Statement, StatementId, StatementKind, WorkflowId};
