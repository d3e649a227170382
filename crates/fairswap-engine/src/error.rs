use thiserror::Error;

use fairswap_protocol::{Amount, AmountError, ValidationError};

use crate::state::ProtocolState;

/// Failure reported by a gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("insufficient funds, {required} required")]
    InsufficientFunds { required: Amount },

    #[error("message delivery failed: {0}")]
    SendFailed(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("account '{account_id}' does not match ledger-anchored identity")]
    IdentityMismatch { account_id: String },

    #[error("transaction publish failed: {0}")]
    PublishFailed(String),

    #[error("wallet error: {0}")]
    Wallet(String),
}

/// Failure of one task in the chain, routed to the orchestrator's single
/// fault path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("fee tx seen by {seen} peers, {required} required")]
    InsufficientPeerVisibility { seen: u32, required: u32 },

    #[error("peer contract does not match ours (fingerprint {ours})")]
    ContractMismatch { ours: String },

    #[error(transparent)]
    Allocation(#[from] AmountError),

    #[error("confirmation stream closed before the deposit confirmed")]
    ConfirmationStreamClosed,
}

/// Error surface of the orchestrator entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Malformed or misaddressed message, rejected at the gate. Transient:
    /// no state was mutated, a corrected retransmission can still succeed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A gateway call failed; the trade is parked for arbitration tooling.
    #[error("task failed in state {state}: {error}")]
    Task {
        state: ProtocolState,
        error: TaskError,
    },

    /// An event arrived whose required predecessor state does not match the
    /// current cursor. A correct, non-malicious counterpart never produces
    /// this; it indicates a replay or a state-machine bug.
    #[error("'{event}' requires state {expected}, current state is {actual}")]
    SequenceViolation {
        event: &'static str,
        expected: ProtocolState,
        actual: ProtocolState,
    },

    /// A message this role never consumes arrived.
    #[error("unexpected message '{message}' in state {state}")]
    UnexpectedMessage {
        message: &'static str,
        state: ProtocolState,
    },
}

impl ProtocolError {
    /// Whether the rejection is transient (retransmittable) rather than a
    /// fault the trade manager must act on.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_transient() {
        let err = ProtocolError::Validation(ValidationError::EmptyField("trade_id"));
        assert!(err.is_transient());

        let err = ProtocolError::SequenceViolation {
            event: "TakeOfferFeePaid",
            expected: ProtocolState::HandleTakeOfferRequest,
            actual: ProtocolState::RequestTakerDepositPayment,
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_task_error_display_carries_state() {
        let err = ProtocolError::Task {
            state: ProtocolState::CreateDepositTx,
            error: TaskError::Gateway(GatewayError::InsufficientFunds {
                required: Amount::from_sats(10_010_000),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("CreateDepositTx"));
        assert!(text.contains("insufficient funds"));
    }
}
