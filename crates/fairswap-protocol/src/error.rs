use thiserror::Error;

/// Rejection produced by the message validation gate.
///
/// A validation error means the message was malformed or adversarial. It is
/// not a protocol-sequence violation: the orchestrator's state is untouched
/// and the sender may retransmit a corrected message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("field '{0}' must be a non-zero amount")]
    ZeroAmount(&'static str),

    #[error("field '{0}' is missing")]
    MissingField(&'static str),

    #[error("message carries trade id '{got}', expected '{expected}'")]
    TradeIdMismatch { expected: String, got: String },

    #[error("unsupported protocol version {got}, expected {expected}")]
    VersionMismatch { expected: u32, got: u32 },
}

/// Arithmetic failure while computing payout allocations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount overflow computing {0}")]
    Overflow(&'static str),
}
