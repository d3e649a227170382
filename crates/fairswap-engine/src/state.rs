use serde::{Deserialize, Serialize};

/// Execution cursor of one offerer-as-buyer trade.
///
/// Strictly ordered and forward-only: the orchestrator only ever assigns a
/// later value, except for the terminal `Faulted`, reachable from any state.
/// At most one value is current per trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProtocolState {
    Init,
    /// Acceptance response sent; waiting for the taker's fee-paid message.
    HandleTakeOfferRequest,
    VerifyTakeOfferFeePayment,
    CreateDepositTx,
    /// Deposit request sent; waiting for the taker's publish request.
    RequestTakerDepositPayment,
    VerifyTakerAccount,
    VerifyAndSignContract,
    SignAndPublishDepositTx,
    SendDepositTxIdToTaker,
    SetupListenerForBlockChainConfirmation,
    /// Listener registered; waiting for the deposit to reach the required
    /// confirmation depth.
    WaitForDepositConfirmation,
    /// Deposit confirmed; waiting for the buyer to confirm the off-chain
    /// payment was initiated. The only state accepting the UI event.
    DepositConfirmed,
    /// Half-signed payout sent; waiting for the taker's publication notice.
    SendSignedPayoutTx,
    Completed,
    Faulted,
}

impl ProtocolState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Faulted)
    }
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
