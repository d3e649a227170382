//! Canonical trade contract.
//!
//! Both parties independently build the same [`Contract`] from the agreed
//! terms and must derive byte-identical canonical JSON before either accepts
//! the other's signature. The encoding is serialization-stable: fixed field
//! order (struct declaration order), hex-encoded public keys, no volatile
//! fields such as timestamps.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{Amount, BankAccount};

/// The signed document recording the final agreed trade terms, exchanged for
/// later dispute evidence.
///
/// Field order is the canonical wire order; do not reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub offer_id: String,
    pub trade_amount: Amount,
    pub take_offer_fee_tx_id: String,
    pub offerer_account_id: String,
    pub taker_account_id: String,
    pub offerer_bank_account: BankAccount,
    pub taker_bank_account: BankAccount,
    /// Hex-encoded message-layer public key of the offerer.
    pub offerer_message_pub_key: String,
    /// Hex-encoded message-layer public key of the taker.
    pub taker_message_pub_key: String,
}

impl Contract {
    /// The canonical JSON both parties must reproduce byte-identically.
    pub fn canonical_json(&self) -> String {
        // serde_json emits struct fields in declaration order; a value with
        // no maps or non-string keys cannot fail to serialize. Must never
        // degrade into an empty string: that would compare equal against a
        // peer's empty contract.
        serde_json::to_string(self).expect("contract has no unserializable fields")
    }

    /// SHA-256 over the canonical JSON, hex encoded. Used as the signing
    /// payload reference and in logs.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Strict equality check against the counterparty's contract JSON.
    ///
    /// Serialization-level differences are not tolerated: a peer producing
    /// different bytes either disagrees on the terms or runs an incompatible
    /// encoder, and both cases must surface before signing.
    pub fn matches_peer_json(&self, peer_json: &str) -> bool {
        self.canonical_json() == peer_json
    }
}
