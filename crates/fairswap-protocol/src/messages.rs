use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Amount, BankAccount, TradeId};

/// Wire protocol version. Bumped on any change to the message shapes; peers
/// speaking another version are rejected at the gate instead of being routed
/// to a parallel implementation.
pub const PROTOCOL_VERSION: u32 = 1;

/// Offerer's answer to a take-offer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondToTakeOfferRequest {
    pub trade_id: TradeId,
    pub accepted: bool,
}

/// Taker notifies the offerer that the take-offer fee was paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeOfferFeePaid {
    pub trade_id: TradeId,
    pub fee_tx_id: String,
    pub trade_amount: Amount,
    /// Hex-encoded multisig public key of the taker.
    pub taker_pub_key: String,
}

/// Taker returns their signed half of the deposit and asks the offerer to
/// verify, sign and publish it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOffererPublishDepositTx {
    pub trade_id: TradeId,
    pub taker_payout_address: String,
    pub taker_account_id: String,
    pub taker_bank_account: BankAccount,
    /// Hex-encoded message-layer public key of the taker.
    pub taker_message_pub_key: String,
    /// The taker's independently derived canonical contract JSON.
    pub taker_contract_json: String,
    pub signed_taker_deposit_tx_hex: String,
    pub connecting_output_hex: String,
    pub script_sig_hex: String,
    pub taker_tx_out_index: u64,
}

/// Offerer tells the taker the deposit transaction was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositTxPublished {
    pub trade_id: TradeId,
    pub deposit_tx_hex: String,
}

/// Offerer sends their half of the deposit and asks the taker to fund it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTakerDepositPayment {
    pub trade_id: TradeId,
    pub bank_account: BankAccount,
    pub account_id: String,
    /// Hex-encoded multisig public key of the offerer.
    pub offerer_pub_key: String,
    pub prepared_deposit_tx_hex: String,
    pub offerer_tx_out_index: u64,
}

/// Offerer confirms the off-chain payment was initiated and hands the taker
/// a half-signed payout transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransferInited {
    pub trade_id: TradeId,
    pub deposit_tx_hex: String,
    pub offerer_signature_r: String,
    pub offerer_signature_s: String,
    pub offerer_payback_amount: Amount,
    pub taker_payback_amount: Amount,
    pub offerer_payout_address: String,
}

/// Taker notifies the offerer that the payout transaction was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutTxPublished {
    pub trade_id: TradeId,
    pub payout_tx_hex: String,
}

/// Closed set of peer messages for one trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TradeMessage {
    RespondToTakeOfferRequest(RespondToTakeOfferRequest),
    /// Wire tag keeps the historical spelling for peer compatibility.
    #[serde(rename = "TakeOfferFeePayed")]
    TakeOfferFeePaid(TakeOfferFeePaid),
    RequestOffererPublishDepositTx(RequestOffererPublishDepositTx),
    DepositTxPublished(DepositTxPublished),
    RequestTakerDepositPayment(RequestTakerDepositPayment),
    BankTransferInited(BankTransferInited),
    PayoutTxPublished(PayoutTxPublished),
}

impl TradeMessage {
    /// The trade this message belongs to. Messages carry no sequence numbers;
    /// ordering is the orchestrator's state guard's job.
    pub fn trade_id(&self) -> &TradeId {
        match self {
            Self::RespondToTakeOfferRequest(m) => &m.trade_id,
            Self::TakeOfferFeePaid(m) => &m.trade_id,
            Self::RequestOffererPublishDepositTx(m) => &m.trade_id,
            Self::DepositTxPublished(m) => &m.trade_id,
            Self::RequestTakerDepositPayment(m) => &m.trade_id,
            Self::BankTransferInited(m) => &m.trade_id,
            Self::PayoutTxPublished(m) => &m.trade_id,
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RespondToTakeOfferRequest(_) => "RespondToTakeOfferRequest",
            Self::TakeOfferFeePaid(_) => "TakeOfferFeePayed",
            Self::RequestOffererPublishDepositTx(_) => "RequestOffererPublishDepositTx",
            Self::DepositTxPublished(_) => "DepositTxPublished",
            Self::RequestTakerDepositPayment(_) => "RequestTakerDepositPayment",
            Self::BankTransferInited(_) => "BankTransferInited",
            Self::PayoutTxPublished(_) => "PayoutTxPublished",
        }
    }
}

/// Versioned wire framing around a [`TradeMessage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub version: u32,
    pub message: TradeMessage,
}

impl WireEnvelope {
    pub fn new(message: TradeMessage) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message,
        }
    }

    /// Decode an envelope, rejecting unknown protocol versions before the
    /// payload is looked at.
    pub fn decode(json: &str) -> Result<TradeMessage, ValidationError> {
        let envelope: WireEnvelope =
            serde_json::from_str(json).map_err(|_| ValidationError::MissingField("message"))?;
        if envelope.version != PROTOCOL_VERSION {
            return Err(ValidationError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: envelope.version,
            });
        }
        Ok(envelope.message)
    }

    pub fn encode(&self) -> String {
        // Serialization of a fully-owned value with no maps cannot fail;
        // an empty frame must never reach the wire.
        serde_json::to_string(self).expect("envelope has no unserializable fields")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let msg = TradeMessage::TakeOfferFeePaid(TakeOfferFeePaid {
            trade_id: TradeId::new("t-1"),
            fee_tx_id: "abc".into(),
            trade_amount: Amount::from_sats(50_000_000),
            taker_pub_key: "02ab".into(),
        });
        let encoded = WireEnvelope::new(msg.clone()).encode();
        let decoded = WireEnvelope::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_envelope_rejects_unknown_version() {
        let msg = TradeMessage::PayoutTxPublished(PayoutTxPublished {
            trade_id: TradeId::new("t-1"),
            payout_tx_hex: "00".into(),
        });
        let mut envelope = WireEnvelope::new(msg);
        envelope.version = 99;
        let err = WireEnvelope::decode(&envelope.encode()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: 99
            }
        );
    }

    #[test]
    fn test_fee_paid_uses_the_historical_wire_tag() {
        let msg = TradeMessage::TakeOfferFeePaid(TakeOfferFeePaid {
            trade_id: TradeId::new("t-3"),
            fee_tx_id: "abc".into(),
            trade_amount: Amount::from_sats(1),
            taker_pub_key: "02ab".into(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"TakeOfferFeePayed\""));
        assert_eq!(msg.name(), "TakeOfferFeePayed");
        let back: TradeMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_message_is_tagged_by_type() {
        let msg = TradeMessage::DepositTxPublished(DepositTxPublished {
            trade_id: TradeId::new("t-2"),
            deposit_tx_hex: "beef".into(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"DepositTxPublished\""));
    }
}
