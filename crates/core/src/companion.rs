//! Companion matching: which communication statements are compatible.
//!
//! The half-duplex state of a `sendAndReceive` is match-attempt state,
//! not statement state: each attempt to match two combinations walks
//! with its own [`HalfDuplex`] slots, so the cross-product search over
//! combination pairs never observes a toggle left behind by an earlier
//! attempt. States are only advanced on a successful match; a failed
//! attempt discards its slots wholesale.

use crate::statement::{PairRole, Statement, StatementKind};
use duplex_interchange::ServicePair;

/// Phase of a `sendAndReceive` within one match attempt. The send half
/// always acts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfDuplex {
    PendingSend,
    PendingReceive,
}

impl HalfDuplex {
    /// Initial phase for any statement.
    pub fn initial() -> Self {
        HalfDuplex::PendingSend
    }
}

/// The declared (initiating, responding) service pairs of a workflow set.
#[derive(Debug, Clone, Default)]
pub struct PairTable {
    pairs: Vec<(String, String)>,
}

impl PairTable {
    pub fn from_pairs(pairs: &[ServicePair]) -> Self {
        PairTable {
            pairs: pairs
                .iter()
                .map(|p| (p.initiating.clone(), p.responding.clone()))
                .collect(),
        }
    }

    /// True if `initiating` and `responding` form a declared pair, in
    /// that orientation.
    pub fn is_pair(&self, initiating: &str, responding: &str) -> bool {
        self.pairs
            .iter()
            .any(|(i, r)| i == initiating && r == responding)
    }

    /// Infer the role a service kind plays, when unambiguous. A kind
    /// appearing on both sides of the table (a self-paired service) or
    /// on neither stays unknown.
    pub fn role_of(&self, service: &str) -> Option<PairRole> {
        let initiating = self.pairs.iter().any(|(i, _)| i == service);
        let responding = self.pairs.iter().any(|(_, r)| r == service);
        match (initiating, responding) {
            (true, false) => Some(PairRole::Initiating),
            (false, true) => Some(PairRole::Responding),
            _ => None,
        }
    }
}

/// What a communication statement does in its current phase.
enum Action<'a> {
    Send(&'a str),
    Receive(&'a str),
    Paired {
        service: &'a str,
        role: Option<PairRole>,
    },
}

fn action_of(statement: &Statement, state: HalfDuplex) -> Option<Action<'_>> {
    match &statement.kind {
        StatementKind::Send { payload, .. } => Some(Action::Send(payload)),
        StatementKind::Receive { payload, .. } => Some(Action::Receive(payload)),
        StatementKind::SendReceive { sent, received, .. } => match state {
            HalfDuplex::PendingSend => Some(Action::Send(sent)),
            HalfDuplex::PendingReceive => Some(Action::Receive(received)),
        },
        StatementKind::PairedCall { service, role, .. } => Some(Action::Paired {
            service,
            role: *role,
        }),
        _ => None,
    }
}

fn toggle_if_half_duplex(statement: &Statement, state: &mut HalfDuplex) {
    if let StatementKind::SendReceive { .. } = statement.kind {
        *state = match *state {
            HalfDuplex::PendingSend => HalfDuplex::PendingReceive,
            HalfDuplex::PendingReceive => HalfDuplex::PendingSend,
        };
    }
}

/// Decide whether `left` (initiator side) accepts `right` (responder
/// side) as its companion in their current phases. On success the
/// half-duplex phases of any `sendAndReceive` involved are advanced;
/// on failure both slots are left untouched.
pub fn accepts_companion(
    left: &Statement,
    left_state: &mut HalfDuplex,
    right: &Statement,
    right_state: &mut HalfDuplex,
    pairs: &PairTable,
) -> bool {
    let accepted = match (action_of(left, *left_state), action_of(right, *right_state)) {
        (Some(Action::Send(sent)), Some(Action::Receive(received)))
        | (Some(Action::Receive(received)), Some(Action::Send(sent))) => sent == received,
        (
            Some(Action::Paired {
                service: left_service,
                role: left_role,
            }),
            Some(Action::Paired {
                service: right_service,
                role: right_role,
            }),
        ) => paired_accepts(left_service, left_role, right_service, right_role, pairs),
        _ => false,
    };

    if accepted {
        toggle_if_half_duplex(left, left_state);
        toggle_if_half_duplex(right, right_state);
    }

    accepted
}

/// Role resolution for two paired calls: explicit roles win, a single
/// unknown side takes the complementary role, and two unknown sides
/// default to left-initiates. Two sides resolving to the same known
/// role never pair.
fn paired_accepts(
    left_service: &str,
    left_role: Option<PairRole>,
    right_service: &str,
    right_role: Option<PairRole>,
    pairs: &PairTable,
) -> bool {
    if let (Some(l), Some(r)) = (left_role, right_role) {
        if l == r {
            return false;
        }
    }

    let left_initiates = !matches!(
        (left_role, right_role),
        (Some(PairRole::Responding), _) | (_, Some(PairRole::Initiating))
    );

    if left_initiates {
        pairs.is_pair(left_service, right_service)
    } else {
        pairs.is_pair(right_service, left_service)
    }
}

/// Whether the statement leaves its queue after a successful match.
/// A `sendAndReceive` stays at the head while its receive half is still
/// pending; everything else is consumed in one round.
pub fn consumed_after_match(statement: &Statement, state_after: HalfDuplex) -> bool {
    match statement.kind {
        StatementKind::SendReceive { .. } => state_after == HalfDuplex::PendingSend,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementId;

    fn stmt(id: u32, kind: StatementKind) -> Statement {
        Statement {
            id: StatementId(id),
            line: id,
            description: String::new(),
            kind,
        }
    }

    fn send(id: u32, payload: &str) -> Statement {
        stmt(id, StatementKind::Send {
            session: "s".to_string(),
            payload: payload.to_string(),
        })
    }

    fn receive(id: u32, payload: &str) -> Statement {
        stmt(id, StatementKind::Receive {
            session: "s".to_string(),
            payload: payload.to_string(),
        })
    }

    fn send_receive(id: u32, sent: &str, received: &str) -> Statement {
        stmt(id, StatementKind::SendReceive {
            session: "s".to_string(),
            sent: sent.to_string(),
            received: received.to_string(),
        })
    }

    fn paired(id: u32, service: &str, role: Option<PairRole>) -> Statement {
        stmt(id, StatementKind::PairedCall {
            service: service.to_string(),
            role,
            session: None,
        })
    }

    fn check(left: &Statement, right: &Statement) -> bool {
        let mut l = HalfDuplex::initial();
        let mut r = HalfDuplex::initial();
        accepts_companion(left, &mut l, right, &mut r, &PairTable::default())
    }

    #[test]
    fn test_send_accepts_matching_receive() {
        assert!(check(&send(1, "T"), &receive(2, "T")));
        assert!(check(&receive(1, "T"), &send(2, "T")));
    }

    #[test]
    fn test_payload_mismatch_rejected() {
        assert!(!check(&send(1, "T"), &receive(2, "U")));
    }

    #[test]
    fn test_same_direction_rejected() {
        assert!(!check(&send(1, "T"), &send(2, "T")));
        assert!(!check(&receive(1, "T"), &receive(2, "T")));
    }

    #[test]
    fn test_send_receive_acts_as_send_then_receive() {
        let sar = send_receive(1, "T", "U");
        let mut sar_state = HalfDuplex::initial();
        let mut other_state = HalfDuplex::initial();
        let table = PairTable::default();

        // First round: the send half matches a receive of T.
        assert!(accepts_companion(
            &sar,
            &mut sar_state,
            &receive(2, "T"),
            &mut other_state,
            &table
        ));
        assert_eq!(sar_state, HalfDuplex::PendingReceive);
        assert!(!consumed_after_match(&sar, sar_state));

        // Second round: the receive half matches a send of U.
        let mut other_state = HalfDuplex::initial();
        assert!(accepts_companion(
            &sar,
            &mut sar_state,
            &send(3, "U"),
            &mut other_state,
            &table
        ));
        assert_eq!(sar_state, HalfDuplex::PendingSend);
        assert!(consumed_after_match(&sar, sar_state));
    }

    #[test]
    fn test_send_receive_rejects_wrong_half_first() {
        // While the send half is pending the statement cannot act as a
        // receive, so a companion send of the received type fails.
        let sar = send_receive(1, "T", "U");
        let mut sar_state = HalfDuplex::initial();
        let mut other_state = HalfDuplex::initial();
        assert!(!accepts_companion(
            &sar,
            &mut sar_state,
            &send(2, "U"),
            &mut other_state,
            &PairTable::default()
        ));
        // Failed attempts leave the phase untouched.
        assert_eq!(sar_state, HalfDuplex::PendingSend);
    }

    #[test]
    fn test_facing_send_receives_reject() {
        // Both sides still have their send half pending, so neither can
        // serve as the other's receive: two facing sendAndReceives are
        // an invalid exchange.
        let left = send_receive(1, "T", "U");
        let right = send_receive(2, "U", "T");
        let mut l = HalfDuplex::initial();
        let mut r = HalfDuplex::initial();

        assert!(!accepts_companion(
            &left,
            &mut l,
            &right,
            &mut r,
            &PairTable::default()
        ));
        assert_eq!(l, HalfDuplex::PendingSend);
        assert_eq!(r, HalfDuplex::PendingSend);
    }

    #[test]
    fn test_staggered_send_receives_match() {
        // Once one side's send half has been consumed it serves as a
        // receive, which the other side's pending send half satisfies.
        let left = send_receive(1, "T", "U");
        let right = send_receive(2, "U", "T");
        let mut l = HalfDuplex::PendingReceive;
        let mut r = HalfDuplex::initial();

        assert!(accepts_companion(
            &left,
            &mut l,
            &right,
            &mut r,
            &PairTable::default()
        ));
        assert_eq!(l, HalfDuplex::PendingSend);
        assert_eq!(r, HalfDuplex::PendingReceive);
        assert!(consumed_after_match(&left, l));
        assert!(!consumed_after_match(&right, r));
    }

    #[test]
    fn test_paired_calls_match_across_roles() {
        let table = PairTable::from_pairs(&[ServicePair {
            initiating: "CollectSignatures".to_string(),
            responding: "SignTransaction".to_string(),
        }]);

        let init = paired(1, "CollectSignatures", Some(PairRole::Initiating));
        let resp = paired(2, "SignTransaction", Some(PairRole::Responding));

        let mut l = HalfDuplex::initial();
        let mut r = HalfDuplex::initial();
        assert!(accepts_companion(&init, &mut l, &resp, &mut r, &table));

        // Orientation is inferred, so the responder may appear on the
        // initiator's side of the queue walk as well.
        let mut l = HalfDuplex::initial();
        let mut r = HalfDuplex::initial();
        assert!(accepts_companion(&resp, &mut l, &init, &mut r, &table));
    }

    #[test]
    fn test_paired_calls_same_role_rejected() {
        let table = PairTable::from_pairs(&[ServicePair {
            initiating: "CollectSignatures".to_string(),
            responding: "SignTransaction".to_string(),
        }]);

        let a = paired(1, "CollectSignatures", Some(PairRole::Initiating));
        let b = paired(2, "CollectSignatures", Some(PairRole::Initiating));

        let mut l = HalfDuplex::initial();
        let mut r = HalfDuplex::initial();
        assert!(!accepts_companion(&a, &mut l, &b, &mut r, &table));
    }

    #[test]
    fn test_paired_calls_unknown_roles_use_table_orientation() {
        let table = PairTable::from_pairs(&[ServicePair {
            initiating: "SwapIdentities".to_string(),
            responding: "SwapIdentities".to_string(),
        }]);

        let a = paired(1, "SwapIdentities", None);
        let b = paired(2, "SwapIdentities", None);

        let mut l = HalfDuplex::initial();
        let mut r = HalfDuplex::initial();
        assert!(accepts_companion(&a, &mut l, &b, &mut r, &table));
    }

    #[test]
    fn test_paired_call_never_matches_plain_send() {
        let table = PairTable::from_pairs(&[ServicePair {
            initiating: "CollectSignatures".to_string(),
            responding: "SignTransaction".to_string(),
        }]);
        let p = paired(1, "CollectSignatures", Some(PairRole::Initiating));
        let mut l = HalfDuplex::initial();
        let mut r = HalfDuplex::initial();
        assert!(!accepts_companion(&p, &mut l, &send(2, "T"), &mut r, &table));
    }
}
