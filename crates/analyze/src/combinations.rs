//! The combination engine: expanding a branch into every
//! distinguishable linear execution path through it.
//!
//! Branching multiplies paths, loops are abstracted to zero or one
//! pass, and early-exit statements lock a path against further growth
//! until the scope the exit is relative to is left. Duplicates are
//! removed at every scope exit so the zero-pass and broken-out paths
//! that converge to the same observable trace do not pile up.

use duplex_core::{Branch, Statement, StatementId, StatementKind, WorkflowId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::{trace, warn};

/// Hard ceiling on the number of combinations kept for one procedure.
/// Expansion past this point truncates the set and flags it.
pub const MAX_COMBINATIONS: usize = 10_000;

/// Early-exit lock on a path. A locked combination represents a path
/// segment that cannot continue, because an earlier statement on it
/// unconditionally left the enclosing loop or procedure. `None` is the
/// only unlocked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    None,
    LoopBreak,
    LoopContinue,
    MethodExit,
}

/// One materialized linear path: a statement sequence plus lock status.
#[derive(Debug, Clone)]
pub struct Combination {
    branch: Branch,
    lock: LockStatus,
}

impl Combination {
    pub fn new() -> Self {
        Combination {
            branch: Branch::new(),
            lock: LockStatus::None,
        }
    }

    pub fn lock(&self) -> LockStatus {
        self.lock
    }

    pub fn is_locked(&self) -> bool {
        self.lock != LockStatus::None
    }

    pub fn branch(&self) -> &Branch {
        &self.branch
    }

    pub fn statements(&self) -> &[Rc<Statement>] {
        self.branch.statements()
    }

    /// Append one statement if the path is still open; an early-exit
    /// statement locks the path after being appended.
    pub fn push(&mut self, statement: &Rc<Statement>) {
        if self.is_locked() {
            return;
        }
        self.branch.append(statement.clone());
        self.lock = lock_for(statement);
    }

    /// Append a whole later path segment. The lock status is taken from
    /// the addition, since it was produced later on the path.
    pub fn append_combination(&mut self, addition: &Combination) {
        if self.is_locked() {
            return;
        }
        self.branch.append_branch(&addition.branch);
        self.lock = addition.lock;
    }

    fn prepend(&mut self, statement: &Rc<Statement>) {
        self.branch.prepend(statement.clone());
    }

    fn clear_loop_locks(&mut self) {
        if matches!(self.lock, LockStatus::LoopBreak | LockStatus::LoopContinue) {
            self.lock = LockStatus::None;
        }
    }

    fn clear_all_locks(&mut self) {
        self.lock = LockStatus::None;
    }

    /// Structural identity for de-duplication: same statement sequence
    /// and same lock status.
    fn key(&self) -> (Vec<StatementId>, LockStatus) {
        (
            self.branch.iter().map(|s| s.id).collect(),
            self.lock,
        )
    }
}

impl Default for Combination {
    fn default() -> Self {
        Combination::new()
    }
}

fn lock_for(statement: &Statement) -> LockStatus {
    if statement.is_loop_break() {
        LockStatus::LoopBreak
    } else if statement.is_loop_continue() {
        LockStatus::LoopContinue
    } else if statement.is_method_exit() {
        LockStatus::MethodExit
    } else {
        LockStatus::None
    }
}

/// The set of all distinguishable linear paths through a branch.
#[derive(Debug, Clone)]
pub struct CombinationSet {
    combinations: Vec<Combination>,
    truncated: bool,
}

impl CombinationSet {
    /// A set holding one empty, unlocked combination: the expansion of
    /// an empty branch, and the seed every expansion starts from.
    pub fn with_empty() -> Self {
        CombinationSet {
            combinations: vec![Combination::new()],
            truncated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn combinations(&self) -> &[Combination] {
        &self.combinations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Combination> {
        self.combinations.iter()
    }

    /// Union with another set: the alternatives of a branching
    /// statement accumulate side by side.
    pub fn merge(&mut self, other: CombinationSet) {
        self.truncated |= other.truncated;
        self.combinations.extend(other.combinations);
    }

    /// Append one statement to every unlocked combination.
    pub fn append_statement(&mut self, statement: &Rc<Statement>) {
        for combination in &mut self.combinations {
            combination.push(statement);
        }
    }

    /// Insert one statement at the front of every combination,
    /// regardless of lock: a condition communication runs before the
    /// paths it guards, including the ones that later lock.
    pub fn prepend_statement(&mut self, statement: &Rc<Statement>) {
        for combination in &mut self.combinations {
            combination.prepend(statement);
        }
    }

    /// Cross-product append of a later path segment set onto this one.
    ///
    /// Locked combinations never grow; they survive untouched. When the
    /// addition holds a single combination it is appended in place, an
    /// optimization with no observable difference from the product.
    pub fn combine(&mut self, addition: &CombinationSet) {
        self.truncated |= addition.truncated;
        match addition.combinations.len() {
            0 => {}
            1 => {
                let single = &addition.combinations[0];
                for combination in &mut self.combinations {
                    combination.append_combination(single);
                }
            }
            _ => {
                let mut products =
                    Vec::with_capacity(self.combinations.len() * addition.combinations.len());
                for current in &self.combinations {
                    if current.is_locked() {
                        products.push(current.clone());
                        continue;
                    }
                    for added in &addition.combinations {
                        let mut product = current.clone();
                        product.append_combination(added);
                        products.push(product);
                    }
                }
                self.combinations = products;
            }
        }
        self.enforce_ceiling();
    }

    /// Leave a loop scope: break/continue locks become meaningless and
    /// converged paths collapse.
    pub fn reduce_loop_scope(&mut self) {
        for combination in &mut self.combinations {
            combination.clear_loop_locks();
        }
        self.dedup();
    }

    /// Leave the procedure scope: every lock is terminal there, so all
    /// are cleared before the set is cached or matched.
    pub fn reduce_terminal(&mut self) {
        for combination in &mut self.combinations {
            combination.clear_all_locks();
        }
        self.dedup();
    }

    /// Remove combinations structurally identical to an earlier one.
    pub fn dedup(&mut self) {
        let mut seen: HashSet<(Vec<StatementId>, LockStatus)> =
            HashSet::with_capacity(self.combinations.len());
        self.combinations.retain(|c| seen.insert(c.key()));
    }

    fn enforce_ceiling(&mut self) {
        if self.combinations.len() > MAX_COMBINATIONS {
            warn!(
                kept = MAX_COMBINATIONS,
                dropped = self.combinations.len() - MAX_COMBINATIONS,
                "combination ceiling reached, truncating path set"
            );
            self.combinations.truncate(MAX_COMBINATIONS);
            self.truncated = true;
        }
    }
}

/// Resolved sub-procedure expansions available while expanding a
/// caller: the fully reduced combination sets of every inlinable plain
/// sub-procedure call target. Targets absent from the map (initiating
/// or degraded sub-procedures) stay opaque single statements.
pub struct ExpansionContext<'a> {
    inline: &'a HashMap<WorkflowId, CombinationSet>,
}

impl<'a> ExpansionContext<'a> {
    pub fn new(inline: &'a HashMap<WorkflowId, CombinationSet>) -> Self {
        ExpansionContext { inline }
    }
}

/// Expand a branch into the set of all linear paths reachable through
/// it.
///
/// Statements are processed in order. A pure early-exit marker is
/// appended to every open path, locks them all, and ends the branch:
/// nothing after it is reachable. Every other statement contributes its
/// own resulting set, cross-product combined into the accumulator.
pub fn expand(branch: &Branch, ctx: &ExpansionContext<'_>) -> CombinationSet {
    let mut acc = CombinationSet::with_empty();

    for statement in branch {
        if statement.is_loop_break()
            || statement.is_loop_continue()
            || statement.is_method_exit()
        {
            acc.append_statement(statement);
            break;
        }

        match &statement.kind {
            StatementKind::Branching {
                condition_comm,
                then_branch,
                else_branch,
                ..
            } => {
                let mut addition = expand(then_branch, ctx);
                match else_branch {
                    Some(else_branch) => addition.merge(expand(else_branch, ctx)),
                    // A missing else arm still offers the path around
                    // the conditional.
                    None => addition.merge(CombinationSet::with_empty()),
                }
                if let Some(comm) = condition_comm {
                    addition.prepend_statement(comm);
                }
                addition.dedup();
                acc.combine(&addition);
            }
            StatementKind::Looping {
                condition_comm,
                body,
                ..
            } => {
                // Zero passes or one abstracted pass.
                let mut addition = CombinationSet::with_empty();
                addition.merge(expand(body, ctx));
                addition.reduce_loop_scope();
                if let Some(comm) = condition_comm {
                    addition.prepend_statement(comm);
                }
                acc.combine(&addition);
            }
            StatementKind::SubWorkflowCall { workflow, .. } => match ctx.inline.get(workflow) {
                Some(sub) => {
                    trace!(target = %workflow, paths = sub.len(), "inlining sub-workflow paths");
                    acc.combine(sub);
                }
                None => acc.append_statement(statement),
            },
            _ => acc.append_statement(statement),
        }
    }

    acc
}
