//! The protocol matcher: queue-based companion matching between an
//! initiator's and a responder's combination sets.
//!
//! Every ordered pair of combinations is tried independently. Within a
//! pair, the two communication projections are walked as FIFO queues;
//! the first head mismatch fails the pair, with no backtracking across
//! alignments. The protocol is valid as soon as one pair matches, and
//! every matched statement pair from every successful alignment emits a
//! link event.

use crate::combinations::{Combination, CombinationSet};
use duplex_core::{
    accepts_companion, consumed_after_match, HalfDuplex, PairTable, Statement, StatementId,
};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;
use tracing::trace;

/// One end of a matched-pair link: enough for a renderer to find and
/// label the statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkEndpoint {
    pub statement: StatementId,
    pub line: u32,
    pub description: String,
}

impl LinkEndpoint {
    fn of(statement: &Statement) -> Self {
        LinkEndpoint {
            statement: statement.id,
            line: statement.line,
            description: statement.description.clone(),
        }
    }
}

/// A matched initiator/responder statement pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedPair {
    pub initiator: LinkEndpoint,
    pub responder: LinkEndpoint,
}

/// Outcome of verifying one initiator/responder procedure pair.
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolMatch {
    pub valid: bool,
    pub links: Vec<MatchedPair>,
}

/// Verify an initiator's combination set against its responder's.
///
/// The protocol is valid if at least one (initiator, responder)
/// combination pair matches end to end. All successful alignments
/// contribute links; a statement pair is emitted once even when several
/// alignments produce it.
pub fn verify(
    initiator: &CombinationSet,
    responder: &CombinationSet,
    pairs: &PairTable,
) -> ProtocolMatch {
    let mut valid = false;
    let mut links = Vec::new();
    let mut seen: HashSet<(StatementId, StatementId)> = HashSet::new();

    for left in initiator.iter() {
        for right in responder.iter() {
            if let Some(matches) = match_combinations(left, right, pairs) {
                valid = true;
                for (l, r) in matches {
                    if seen.insert((l.id, r.id)) {
                        links.push(MatchedPair {
                            initiator: LinkEndpoint::of(&l),
                            responder: LinkEndpoint::of(&r),
                        });
                    }
                }
            }
        }
    }

    ProtocolMatch { valid, links }
}

/// A queue slot: the statement plus its half-duplex phase for this
/// match attempt only.
struct MatchSlot {
    statement: Rc<Statement>,
    phase: HalfDuplex,
}

impl MatchSlot {
    fn new(statement: Rc<Statement>) -> Self {
        MatchSlot {
            statement,
            phase: HalfDuplex::initial(),
        }
    }
}

/// Walk two combinations' communication projections as queues.
///
/// Returns the matched statement pairs on success (possibly empty when
/// neither side communicates, still a valid protocol), or `None` when
/// the combinations are incompatible: a head mismatch, or one side
/// running out of statements while the other still has some.
fn match_combinations(
    left: &Combination,
    right: &Combination,
    pairs: &PairTable,
) -> Option<Vec<(Rc<Statement>, Rc<Statement>)>> {
    let mut initiating_queue: VecDeque<MatchSlot> = left
        .branch()
        .communication_statements_only()
        .into_iter()
        .map(MatchSlot::new)
        .collect();
    let mut initiated_queue: VecDeque<MatchSlot> = right
        .branch()
        .communication_statements_only()
        .into_iter()
        .map(MatchSlot::new)
        .collect();

    let mut matches = Vec::new();
    let mut round = 0u32;

    while !(initiating_queue.is_empty() && initiated_queue.is_empty()) {
        let (Some(head_left), Some(head_right)) =
            (initiating_queue.front_mut(), initiated_queue.front_mut())
        else {
            // One queue still has statements while the other is done: a
            // message with no counterpart.
            return None;
        };

        trace!(
            round,
            left = %head_left.statement,
            right = %head_right.statement,
            "matching queue heads"
        );
        round += 1;

        if !accepts_companion(
            &head_left.statement,
            &mut head_left.phase,
            &head_right.statement,
            &mut head_right.phase,
            pairs,
        ) {
            return None;
        }

        matches.push((head_left.statement.clone(), head_right.statement.clone()));

        let pop_left = consumed_after_match(&head_left.statement, head_left.phase);
        let pop_right = consumed_after_match(&head_right.statement, head_right.phase);
        if pop_left {
            initiating_queue.pop_front();
        }
        if pop_right {
            initiated_queue.pop_front();
        }
    }

    Some(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplex_core::{Branch, StatementKind};
    use std::collections::HashMap;

    fn stmt(id: u32, kind: StatementKind) -> Rc<Statement> {
        Rc::new(Statement {
            id: StatementId(id),
            line: id,
            description: format!("stmt {}", id),
            kind,
        })
    }

    fn send(id: u32, payload: &str) -> Rc<Statement> {
        stmt(id, StatementKind::Send {
            session: "s".to_string(),
            payload: payload.to_string(),
        })
    }

    fn receive(id: u32, payload: &str) -> Rc<Statement> {
        stmt(id, StatementKind::Receive {
            session: "s".to_string(),
            payload: payload.to_string(),
        })
    }

    fn send_receive(id: u32, sent: &str, received: &str) -> Rc<Statement> {
        stmt(id, StatementKind::SendReceive {
            session: "s".to_string(),
            sent: sent.to_string(),
            received: received.to_string(),
        })
    }

    fn set_of(statements: Vec<Rc<Statement>>) -> CombinationSet {
        let mut branch = Branch::new();
        for s in statements {
            branch.append(s);
        }
        let inline = HashMap::new();
        crate::combinations::expand(&branch, &crate::combinations::ExpansionContext::new(&inline))
    }

    fn table() -> PairTable {
        PairTable::default()
    }

    #[test]
    fn test_send_receive_round_trip() {
        let result = verify(
            &set_of(vec![send(1, "T")]),
            &set_of(vec![receive(2, "T")]),
            &table(),
        );
        assert!(result.valid);
        assert_eq!(result.links.len(), 1);
        assert_eq!(result.links[0].initiator.statement, StatementId(1));
        assert_eq!(result.links[0].responder.statement, StatementId(2));
    }

    #[test]
    fn test_payload_mismatch_fails_with_no_links() {
        let result = verify(
            &set_of(vec![send(1, "T")]),
            &set_of(vec![receive(2, "U")]),
            &table(),
        );
        assert!(!result.valid);
        assert!(result.links.is_empty());
    }

    #[test]
    fn test_empty_sides_are_a_valid_protocol() {
        let result = verify(&set_of(vec![]), &set_of(vec![]), &table());
        assert!(result.valid);
        assert!(result.links.is_empty());
    }

    #[test]
    fn test_unbalanced_queues_fail() {
        let result = verify(&set_of(vec![send(1, "T")]), &set_of(vec![]), &table());
        assert!(!result.valid);

        let result = verify(&set_of(vec![]), &set_of(vec![receive(2, "T")]), &table());
        assert!(!result.valid);
    }

    #[test]
    fn test_send_and_receive_toggles_across_two_rounds() {
        let result = verify(
            &set_of(vec![send_receive(1, "T", "U")]),
            &set_of(vec![receive(2, "T"), send(3, "U")]),
            &table(),
        );
        assert!(result.valid);
        // The sendAndReceive matched twice: once per half.
        assert_eq!(result.links.len(), 2);
        assert_eq!(result.links[0].responder.statement, StatementId(2));
        assert_eq!(result.links[1].responder.statement, StatementId(3));
    }

    #[test]
    fn test_send_and_receive_wrong_responder_order_fails() {
        let result = verify(
            &set_of(vec![send_receive(1, "T", "U")]),
            &set_of(vec![send(2, "U"), receive(3, "T")]),
            &table(),
        );
        assert!(!result.valid);
    }

    #[test]
    fn test_first_mismatch_aborts_the_pair() {
        // The second statements would pair up fine, but the heads do
        // not, and there is no backtracking within a pair.
        let result = verify(
            &set_of(vec![send(1, "T"), send(2, "V")]),
            &set_of(vec![receive(3, "U"), receive(4, "V")]),
            &table(),
        );
        assert!(!result.valid);
    }

    #[test]
    fn test_one_matching_alternative_is_enough() {
        // Initiator sends T or U depending on a branch; the responder
        // only receives T. The T path aligns, so the protocol holds.
        let conditional = stmt(10, StatementKind::Branching {
            condition: "flag".to_string(),
            condition_comm: None,
            then_branch: {
                let mut b = Branch::new();
                b.append(send(11, "T"));
                b
            },
            else_branch: Some({
                let mut b = Branch::new();
                b.append(send(12, "U"));
                b
            }),
        });

        let result = verify(
            &set_of(vec![conditional]),
            &set_of(vec![receive(2, "T")]),
            &table(),
        );
        assert!(result.valid);
        assert_eq!(result.links.len(), 1);
        assert_eq!(result.links[0].initiator.statement, StatementId(11));
    }

    #[test]
    fn test_all_successful_alignments_contribute_links() {
        // Both initiator alternatives send T, as distinct statements;
        // each aligns with the single responder receive.
        let conditional = stmt(10, StatementKind::Branching {
            condition: "flag".to_string(),
            condition_comm: None,
            then_branch: {
                let mut b = Branch::new();
                b.append(send(11, "T"));
                b
            },
            else_branch: Some({
                let mut b = Branch::new();
                b.append(send(12, "T"));
                b
            }),
        });

        let result = verify(
            &set_of(vec![conditional]),
            &set_of(vec![receive(2, "T")]),
            &table(),
        );
        assert!(result.valid);
        assert_eq!(result.links.len(), 2);
    }

    #[test]
    fn test_duplicate_alignments_emit_one_link() {
        // A loop gives the responder a zero-pass and a one-pass path;
        // the send/receive pair matches in the one-pass alignment only,
        // and the link appears exactly once.
        let looping = stmt(10, StatementKind::Looping {
            condition: "again".to_string(),
            condition_comm: None,
            body: {
                let mut b = Branch::new();
                b.append(stmt(11, StatementKind::Opaque {
                    modifies_session: false,
                }));
                b
            },
        });

        let result = verify(
            &set_of(vec![send(1, "T")]),
            &set_of(vec![looping, receive(2, "T")]),
            &table(),
        );
        assert!(result.valid);
        assert_eq!(result.links.len(), 1);
    }

    #[test]
    fn test_non_communication_statements_are_ignored() {
        let result = verify(
            &set_of(vec![
                stmt(1, StatementKind::Opaque {
                    modifies_session: false,
                }),
                send(2, "T"),
            ]),
            &set_of(vec![
                stmt(3, StatementKind::InitiateSession {
                    session: "s".to_string(),
                    party: None,
                }),
                receive(4, "T"),
            ]),
            &table(),
        );
        assert!(result.valid);
        assert_eq!(result.links.len(), 1);
    }
}
