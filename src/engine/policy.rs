use crate::model::{PolicyId, ReservationState};

pub const CANCELLATION_FEE: PolicyId = 1;
pub const LARGE_EVENT: PolicyId = 2;
pub const STANDARD: PolicyId = 3;

/// Parties strictly larger than this are large events.
pub const LARGE_PARTY_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub id: PolicyId,
    pub description: &'static str,
    pub value_cents: i64,
}

pub const POLICIES: [Policy; 3] = [
    Policy {
        id: CANCELLATION_FEE,
        description: "Cancellation fee",
        value_cents: 1000,
    },
    Policy {
        id: LARGE_EVENT,
        description: "Large event",
        value_cents: 5000,
    },
    Policy {
        id: STANDARD,
        description: "Standard",
        value_cents: 0,
    },
];

/// First match wins: a cancellation always carries the fee, then party size
/// decides.
pub fn select_policy(party_size: u32, state: ReservationState) -> PolicyId {
    if state == ReservationState::Cancelled {
        CANCELLATION_FEE
    } else if party_size > LARGE_PARTY_THRESHOLD {
        LARGE_EVENT
    } else {
        STANDARD
    }
}

pub fn policy(id: PolicyId) -> Option<&'static Policy> {
    POLICIES.iter().find(|p| p.id == id)
}
