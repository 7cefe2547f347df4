//! Transaction FSM State Definitions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Transaction FSM States
///
/// Stable numeric ids for persistence. Terminal states: SETTLED (30),
/// FAILED (-10), EXPIRED (-20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransactionState {
    /// Validated and recorded locally, nothing sent yet
    Created = 0,

    /// Gateway request in flight (persist-before-call)
    AwaitingGatewayAck = 10,

    /// Gateway accepted and issued a reference; waiting for the outcome
    AwaitingConfirmation = 20,

    /// Terminal: money moved
    Settled = 30,

    /// Terminal: declined, or no response after retries
    Failed = -10,

    /// Terminal: no confirmation within the observation window.
    /// Outcome unknown, needs out-of-band reconciliation.
    Expired = -20,
}

impl TransactionState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Settled | TransactionState::Failed | TransactionState::Expired
        )
    }

    /// Progress order. Every legal transition strictly increases it.
    #[inline]
    pub fn rank(&self) -> u8 {
        match self {
            TransactionState::Created => 0,
            TransactionState::AwaitingGatewayAck => 1,
            TransactionState::AwaitingConfirmation => 2,
            TransactionState::Settled | TransactionState::Failed | TransactionState::Expired => 3,
        }
    }

    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        matches!(
            (self, next),
            (Created, AwaitingGatewayAck)
                | (Created, Failed)
                | (AwaitingGatewayAck, AwaitingConfirmation)
                | (AwaitingGatewayAck, Settled)
                | (AwaitingGatewayAck, Failed)
                | (AwaitingGatewayAck, Expired)
                | (AwaitingConfirmation, Settled)
                | (AwaitingConfirmation, Failed)
                | (AwaitingConfirmation, Expired)
        )
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionState::Created),
            10 => Some(TransactionState::AwaitingGatewayAck),
            20 => Some(TransactionState::AwaitingConfirmation),
            30 => Some(TransactionState::Settled),
            -10 => Some(TransactionState::Failed),
            -20 => Some(TransactionState::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Created => "CREATED",
            TransactionState::AwaitingGatewayAck => "AWAITING_GATEWAY_ACK",
            TransactionState::AwaitingConfirmation => "AWAITING_CONFIRMATION",
            TransactionState::Settled => "SETTLED",
            TransactionState::Failed => "FAILED",
            TransactionState::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransactionState {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransactionState::from_id(value).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransactionState; 6] = [
        TransactionState::Created,
        TransactionState::AwaitingGatewayAck,
        TransactionState::AwaitingConfirmation,
        TransactionState::Settled,
        TransactionState::Failed,
        TransactionState::Expired,
    ];

    #[test]
    fn test_terminal_states() {
        assert!(TransactionState::Settled.is_terminal());
        assert!(TransactionState::Failed.is_terminal());
        assert!(TransactionState::Expired.is_terminal());

        assert!(!TransactionState::Created.is_terminal());
        assert!(!TransactionState::AwaitingGatewayAck.is_terminal());
        assert!(!TransactionState::AwaitingConfirmation.is_terminal());
    }

    #[test]
    fn test_state_id_roundtrip() {
        for state in ALL {
            assert_eq!(TransactionState::from_id(state.id()), Some(state));
        }
        assert_eq!(TransactionState::from_id(99), None);
    }

    #[test]
    fn test_terminal_states_never_transition() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_transitions_strictly_increase_rank() {
        for from in ALL {
            for to in ALL {
                if from.can_transition_to(to) {
                    assert!(to.rank() > from.rank(), "{} -> {}", from, to);
                }
            }
        }
    }

    #[test]
    fn test_confirmation_requires_ack_first() {
        assert!(!TransactionState::Created.can_transition_to(TransactionState::AwaitingConfirmation));
        assert!(!TransactionState::Created.can_transition_to(TransactionState::Settled));
        assert!(
            !TransactionState::AwaitingConfirmation
                .can_transition_to(TransactionState::AwaitingGatewayAck)
        );
    }
}
