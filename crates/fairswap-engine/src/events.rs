use crate::error::ProtocolError;
use crate::state::ProtocolState;

/// Milestones of one trade, delivered over a channel to the trade manager.
///
/// Replaces a many-method listener interface with one closed enum; the
/// manager matches on the variants it cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    OfferAccepted {
        offer_id: String,
    },
    DepositTxPublished {
        tx_id: String,
    },
    DepositConfirmed {
        tx_id: String,
        depth: u32,
    },
    PayoutTxPublished {
        payout_tx_hex: String,
    },
    /// The trade is parked until the counterpart's next message arrives.
    WaitingForPeer(ProtocolState),
    /// The trade is parked until the buyer confirms the off-chain payment.
    WaitingForUser(ProtocolState),
    /// A task failed or a sequence violation was detected; `state` is the
    /// cursor at the time of failure, for diagnosis and escalation.
    Faulted {
        state: ProtocolState,
        error: ProtocolError,
    },
    Completed(ProtocolState),
}
