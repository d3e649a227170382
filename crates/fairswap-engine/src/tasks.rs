//! The task chain: stateless, independently testable steps of the trade.
//!
//! Each task performs its gateway call(s) and resolves to exactly one
//! outcome, `Ok` or `Err` - never both, never neither, never twice. Tasks do
//! not touch orchestrator state; only the orchestrator copies results into
//! the trade after a task returns.

use std::time::Duration;

use tokio::sync::mpsc;

use fairswap_protocol::{
    Amount, BankAccount, BankTransferInited, Contract, DepositTxPublished, PeerAddress,
    RequestTakerDepositPayment, RespondToTakeOfferRequest, TradeId, TradeMessage, TradeStatus,
};

use crate::error::TaskError;
use crate::gateway::{
    AccountVerifier, ContractSigner, MessagingGateway, PartialDeposit, PublishedTx, WalletGateway,
};

/// Contract, its canonical JSON and our signature, as produced by
/// [`verify_and_sign_contract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedContract {
    pub contract: Contract,
    pub contract_json: String,
    pub signature: String,
}

/// Answer the taker's take-offer request. Accepts only while the trade is
/// still open; a later duplicate request gets a rejection response.
pub async fn handle_take_offer_request(
    messaging: &dyn MessagingGateway,
    peer: &PeerAddress,
    trade_status: TradeStatus,
    trade_id: &TradeId,
) -> Result<bool, TaskError> {
    let accepted = trade_status == TradeStatus::Open;
    tracing::debug!(trade_id = %trade_id, accepted, "responding to take-offer request");
    messaging
        .send(
            peer,
            TradeMessage::RespondToTakeOfferRequest(RespondToTakeOfferRequest {
                trade_id: trade_id.clone(),
                accepted,
            }),
        )
        .await?;
    Ok(accepted)
}

/// Gate on the take-offer fee transaction being visible in the network.
///
/// Visibility is polled, not pushed: the count is re-queried up to
/// `attempts` times with `interval` between polls before giving up.
pub async fn verify_take_offer_fee_payment(
    wallet: &dyn WalletGateway,
    fee_tx_id: &str,
    required: u32,
    attempts: u32,
    interval: Duration,
) -> Result<(), TaskError> {
    let mut seen = 0;
    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(interval).await;
        }
        seen = wallet.peer_visibility_count(fee_tx_id).await?;
        if seen >= required {
            tracing::debug!(fee_tx_id, seen, "take-offer fee visible");
            return Ok(());
        }
        tracing::debug!(fee_tx_id, seen, required, attempt, "fee not yet visible");
    }
    Err(TaskError::InsufficientPeerVisibility { seen, required })
}

/// Build our half of the deposit transaction. The returned output index is
/// recorded verbatim by the caller.
pub async fn create_deposit_tx(
    wallet: &dyn WalletGateway,
    trade_id: &TradeId,
    input_amount: Amount,
    taker_pub_key: &str,
    arbitrator_pub_key: &str,
) -> Result<PartialDeposit, TaskError> {
    let deposit = wallet
        .create_partial_deposit(trade_id, input_amount, taker_pub_key, arbitrator_pub_key)
        .await?;
    tracing::debug!(
        trade_id = %trade_id,
        out_index = deposit.out_index,
        "prepared offerer deposit half"
    );
    Ok(deposit)
}

/// Send the taker our deposit half together with our payment account data.
#[allow(clippy::too_many_arguments)]
pub async fn request_taker_deposit_payment(
    messaging: &dyn MessagingGateway,
    peer: &PeerAddress,
    trade_id: &TradeId,
    bank_account: &BankAccount,
    account_id: &str,
    offerer_pub_key: &str,
    prepared_deposit_tx_hex: &str,
    offerer_tx_out_index: u64,
) -> Result<(), TaskError> {
    messaging
        .send(
            peer,
            TradeMessage::RequestTakerDepositPayment(RequestTakerDepositPayment {
                trade_id: trade_id.clone(),
                bank_account: bank_account.clone(),
                account_id: account_id.to_string(),
                offerer_pub_key: offerer_pub_key.to_string(),
                prepared_deposit_tx_hex: prepared_deposit_tx_hex.to_string(),
                offerer_tx_out_index,
            }),
        )
        .await?;
    Ok(())
}

/// Check the taker's claimed account identity against the ledger.
pub async fn verify_taker_account(
    verifier: &dyn AccountVerifier,
    account_id: &str,
    bank_account: &BankAccount,
) -> Result<(), TaskError> {
    verifier.verify_account(account_id, bank_account).await?;
    tracing::debug!(account_id, "taker account verified");
    Ok(())
}

/// Enforce byte-identical contracts, then sign ours.
///
/// The locally derived canonical JSON must equal the taker's contract JSON
/// exactly. A peer producing different bytes either disagrees on the terms
/// or runs an incompatible encoder; in both cases signing must not happen.
pub async fn verify_and_sign_contract(
    signer: &dyn ContractSigner,
    contract: Contract,
    taker_contract_json: &str,
) -> Result<SignedContract, TaskError> {
    let contract_json = contract.canonical_json();
    if contract_json != taker_contract_json {
        tracing::warn!(
            fingerprint = %contract.fingerprint(),
            "taker contract differs from locally derived contract"
        );
        return Err(TaskError::ContractMismatch {
            ours: contract.fingerprint(),
        });
    }
    let signature = signer.sign_contract(&contract_json).await?;
    tracing::debug!(fingerprint = %contract.fingerprint(), "contract signed");
    Ok(SignedContract {
        contract,
        contract_json,
        signature,
    })
}

/// Combine both deposit halves, sign and broadcast.
#[allow(clippy::too_many_arguments)]
pub async fn sign_and_publish_deposit_tx(
    wallet: &dyn WalletGateway,
    prepared_offerer_tx_hex: &str,
    signed_taker_tx_hex: &str,
    connecting_output_hex: &str,
    script_sig_hex: &str,
    offerer_tx_out_index: u64,
    taker_tx_out_index: u64,
) -> Result<PublishedTx, TaskError> {
    let tx = wallet
        .sign_and_publish_deposit(
            prepared_offerer_tx_hex,
            signed_taker_tx_hex,
            connecting_output_hex,
            script_sig_hex,
            offerer_tx_out_index,
            taker_tx_out_index,
        )
        .await?;
    tracing::info!(tx_id = %tx.tx_id, "deposit transaction published");
    Ok(tx)
}

/// Tell the taker the deposit is out.
pub async fn send_deposit_tx_id_to_taker(
    messaging: &dyn MessagingGateway,
    peer: &PeerAddress,
    trade_id: &TradeId,
    deposit: &PublishedTx,
) -> Result<(), TaskError> {
    messaging
        .send(
            peer,
            TradeMessage::DepositTxPublished(DepositTxPublished {
                trade_id: trade_id.clone(),
                deposit_tx_hex: deposit.tx_hex.clone(),
            }),
        )
        .await?;
    Ok(())
}

/// Register for confirmation-depth events of the deposit transaction.
///
/// Returns the stream; the wait itself is open-ended and resolved externally
/// by block arrival, so the caller forwards the first qualifying depth back
/// into the trade's input queue instead of blocking here.
pub async fn setup_listener_for_blockchain_confirmation(
    wallet: &dyn WalletGateway,
    deposit_tx_id: &str,
) -> Result<mpsc::Receiver<u32>, TaskError> {
    let rx = wallet.subscribe_confirmations(deposit_tx_id).await?;
    tracing::debug!(deposit_tx_id, "listening for deposit confirmations");
    Ok(rx)
}

/// Create and half-sign the payout, then hand it to the taker together with
/// the bank-transfer-initiated notice.
#[allow(clippy::too_many_arguments)]
pub async fn send_signed_payout_tx(
    wallet: &dyn WalletGateway,
    messaging: &dyn MessagingGateway,
    peer: &PeerAddress,
    trade_id: &TradeId,
    deposit_tx_id: &str,
    offerer_payback: Amount,
    taker_payback: Amount,
    offerer_payout_address: &str,
    taker_payout_address: &str,
) -> Result<(), TaskError> {
    let payout = wallet
        .create_and_sign_payout(deposit_tx_id, offerer_payback, taker_payback, taker_payout_address)
        .await?;
    messaging
        .send(
            peer,
            TradeMessage::BankTransferInited(BankTransferInited {
                trade_id: trade_id.clone(),
                deposit_tx_hex: payout.deposit_tx_hex,
                offerer_signature_r: payout.signature_r,
                offerer_signature_s: payout.signature_s,
                offerer_payback_amount: offerer_payback,
                taker_payback_amount: taker_payback,
                offerer_payout_address: offerer_payout_address.to_string(),
            }),
        )
        .await?;
    tracing::info!(trade_id = %trade_id, "half-signed payout sent to taker");
    Ok(())
}
