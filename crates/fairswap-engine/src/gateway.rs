//! Gateway capabilities the engine depends on but does not implement.
//!
//! Gateways are shared, stateless services safe for concurrent use across
//! many trades; all per-trade state lives in the orchestrator.

use async_trait::async_trait;
use tokio::sync::mpsc;

use fairswap_protocol::{Amount, BankAccount, PeerAddress, TradeId, TradeMessage};

use crate::error::GatewayError;

/// Our half of the deposit transaction, as prepared by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDeposit {
    /// Hex-encoded multisig public key the wallet allocated for this trade.
    pub offerer_pub_key: String,
    /// Raw partially-signed transaction, hex encoded.
    pub tx_hex: String,
    /// Index of our output in the transaction. Opaque: recorded exactly as
    /// returned, never recomputed.
    pub out_index: u64,
}

/// A transaction accepted by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedTx {
    pub tx_id: String,
    pub tx_hex: String,
}

/// Half-signed payout produced by the wallet for the counterparty to
/// complete and publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayout {
    /// The deposit transaction the payout spends, hex encoded.
    pub deposit_tx_hex: String,
    pub signature_r: String,
    pub signature_s: String,
}

/// Transaction construction, signing, publication and confirmation queries.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    /// Build and part-sign our half of the 2-of-3 deposit transaction.
    async fn create_partial_deposit(
        &self,
        trade_id: &TradeId,
        input_amount: Amount,
        taker_pub_key: &str,
        arbitrator_pub_key: &str,
    ) -> Result<PartialDeposit, GatewayError>;

    /// Combine both halves of the deposit, sign ours and broadcast.
    #[allow(clippy::too_many_arguments)]
    async fn sign_and_publish_deposit(
        &self,
        prepared_offerer_tx_hex: &str,
        signed_taker_tx_hex: &str,
        connecting_output_hex: &str,
        script_sig_hex: &str,
        offerer_tx_out_index: u64,
        taker_tx_out_index: u64,
    ) -> Result<PublishedTx, GatewayError>;

    /// Build the payout spending the deposit and sign our half of it.
    async fn create_and_sign_payout(
        &self,
        deposit_tx_id: &str,
        offerer_payback: Amount,
        taker_payback: Amount,
        taker_payout_address: &str,
    ) -> Result<SignedPayout, GatewayError>;

    /// How many peers have relayed the given transaction. Used to gate on
    /// the take-offer fee before any deposit is built.
    async fn peer_visibility_count(&self, tx_id: &str) -> Result<u32, GatewayError>;

    /// Stream of confirmation depths for the given transaction, one value
    /// per depth change.
    async fn subscribe_confirmations(
        &self,
        tx_id: &str,
    ) -> Result<mpsc::Receiver<u32>, GatewayError>;
}

/// Send-with-delivery-confirmation to the counterparty. Single attempt; any
/// retry policy lives with the caller's arbitration/manager layer.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send(&self, peer: &PeerAddress, message: TradeMessage) -> Result<(), GatewayError>;
}

/// Validates a counterparty's account claim against chain-anchored data.
#[async_trait]
pub trait AccountVerifier: Send + Sync {
    async fn verify_account(
        &self,
        account_id: &str,
        bank_account: &BankAccount,
    ) -> Result<(), GatewayError>;
}

/// Produces our signature over the canonical contract JSON. The signing key
/// never crosses this boundary.
#[async_trait]
pub trait ContractSigner: Send + Sync {
    async fn sign_contract(&self, canonical_json: &str) -> Result<String, GatewayError>;
}
