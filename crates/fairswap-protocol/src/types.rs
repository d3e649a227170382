use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AmountError;

/// Unique identifier of one negotiated trade. Messages are correlated solely
/// by this id; ordering is enforced by the protocol state guard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TradeId(String);

impl TradeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random trade id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TradeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque address of the counterparty on the messaging overlay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monetary amount in satoshis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_sats(sats: u64) -> Self {
        Self(sats)
    }

    pub const fn sats(&self) -> u64 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} sat", self.0)
    }
}

/// Off-chain payment account of one party, carried in the deposit request
/// messages and anchored into the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub holder_name: String,
    /// Primary account number (IBAN or equivalent).
    pub primary_id: String,
    /// Institution routing id (BIC or equivalent).
    pub secondary_id: String,
    pub country_code: String,
    pub currency_code: String,
}

/// The listing being taken. Immutable once a taker accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    /// Hex-encoded public key of the arbitrator holding the third multisig key.
    pub arbitrator_pub_key: String,
    /// Which of the offerer's payment accounts backs this offer.
    pub bank_account_id: String,
    pub currency_code: String,
    /// Price in minor currency units per whole coin.
    pub price: u64,
}

/// Lifecycle milestones of a trade as seen by the surrounding trade manager.
///
/// Advanced by the protocol engine; the terminal values park the trade for
/// archival or for arbitration tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    Open,
    OffererAccepted,
    DepositPublished,
    DepositConfirmed,
    PaymentStarted,
    PayoutPublished,
    Completed,
    Faulted,
}

/// Aggregate root for one negotiated exchange, role offerer-as-buyer.
///
/// Owned by the trade manager; the protocol engine fills in the fields it
/// accumulates while executing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub offer: Offer,
    pub status: TradeStatus,
    pub trade_amount: Amount,
    /// Collateral locked by each side beyond the trade amount.
    pub collateral: Amount,
    pub take_offer_fee_tx_id: Option<String>,
    pub deposit_tx_id: Option<String>,
    pub contract: Option<crate::contract::Contract>,
    pub contract_json: Option<String>,
    /// Our signature over the canonical contract JSON.
    pub contract_signature: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    pub fn new(id: TradeId, offer: Offer, collateral: Amount) -> Self {
        Self {
            id,
            offer,
            status: TradeStatus::Open,
            trade_amount: Amount::ZERO,
            collateral,
            take_offer_fee_tx_id: None,
            deposit_tx_id: None,
            contract: None,
            contract_json: None,
            contract_signature: None,
            created_at: Utc::now(),
        }
    }
}

/// Paybacks released from the multisig when the trade completes normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutAllocation {
    pub offerer_payback: Amount,
    pub taker_payback: Amount,
}

/// Splits the escrowed funds for a normal completion: the buyer receives the
/// traded amount plus their collateral back, the seller their collateral.
///
/// Conservation holds by construction:
/// `offerer_payback + taker_payback == trade_amount + 2 * collateral`.
pub fn payout_allocation(
    trade_amount: Amount,
    collateral: Amount,
) -> Result<PayoutAllocation, AmountError> {
    let offerer_payback = trade_amount
        .checked_add(collateral)
        .ok_or(AmountError::Overflow("offerer payback"))?;
    Ok(PayoutAllocation {
        offerer_payback,
        taker_payback: collateral,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer() -> Offer {
        Offer {
            id: "offer-1".into(),
            arbitrator_pub_key: "03aa".into(),
            bank_account_id: "acct-1".into(),
            currency_code: "EUR".into(),
            price: 50_000_00,
        }
    }

    #[test]
    fn test_payout_conservation() {
        let trade_amount = Amount::from_sats(100_000_000);
        let collateral = Amount::from_sats(10_000_000);
        let alloc = payout_allocation(trade_amount, collateral).unwrap();

        assert_eq!(alloc.offerer_payback.sats(), 110_000_000);
        assert_eq!(alloc.taker_payback.sats(), 10_000_000);

        let escrowed = trade_amount.sats() + 2 * collateral.sats();
        assert_eq!(
            alloc.offerer_payback.sats() + alloc.taker_payback.sats(),
            escrowed
        );
    }

    #[test]
    fn test_payout_overflow_is_an_error() {
        let result = payout_allocation(Amount::from_sats(u64::MAX), Amount::from_sats(1));
        assert_eq!(result, Err(AmountError::Overflow("offerer payback")));
    }

    #[test]
    fn test_new_trade_starts_open() {
        let trade = Trade::new(TradeId::random(), offer(), Amount::from_sats(1_000));
        assert_eq!(trade.status, TradeStatus::Open);
        assert!(trade.take_offer_fee_tx_id.is_none());
        assert!(trade.deposit_tx_id.is_none());
    }

    #[test]
    fn test_amount_serde_is_transparent() {
        let json = serde_json::to_string(&Amount::from_sats(42)).unwrap();
        assert_eq!(json, "42");
        let back: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(back, Amount::from_sats(42));
    }
}
