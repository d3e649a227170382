//! In-memory gateway implementations for tests and demos.
//!
//! Every mock records how often each capability was exercised and lets a
//! test inject a failure for any single capability. State is behind plain
//! mutexes; nothing is held across an await.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use fairswap_protocol::{Amount, BankAccount, PeerAddress, TradeId, TradeMessage};

use crate::error::GatewayError;
use crate::gateway::{
    AccountVerifier, ContractSigner, MessagingGateway, PartialDeposit, PublishedTx, SignedPayout,
    WalletGateway,
};

fn random_tx_id(prefix: &str) -> String {
    let n: u64 = rand::thread_rng().gen();
    format!("{prefix}-{:016x}", n)
}

/// Scripted wallet. Visibility counts and output indexes are settable so
/// tests can drive the fee gate and check index fidelity.
pub struct MockWallet {
    visibility: AtomicU32,
    deposit_out_index: AtomicU64,
    create_deposit_calls: AtomicU32,
    publish_calls: AtomicU32,
    payout_calls: AtomicU32,
    visibility_calls: AtomicU32,
    create_deposit_error: Mutex<Option<GatewayError>>,
    publish_error: Mutex<Option<GatewayError>>,
    payout_error: Mutex<Option<GatewayError>>,
    confirmation_tx: Mutex<Option<mpsc::Sender<u32>>>,
    last_published: Mutex<Option<PublishedTx>>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self {
            visibility: AtomicU32::new(3),
            deposit_out_index: AtomicU64::new(1),
            create_deposit_calls: AtomicU32::new(0),
            publish_calls: AtomicU32::new(0),
            payout_calls: AtomicU32::new(0),
            visibility_calls: AtomicU32::new(0),
            create_deposit_error: Mutex::new(None),
            publish_error: Mutex::new(None),
            payout_error: Mutex::new(None),
            confirmation_tx: Mutex::new(None),
            last_published: Mutex::new(None),
        }
    }
}

impl MockWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_visibility(&self, count: u32) {
        self.visibility.store(count, Ordering::SeqCst);
    }

    pub fn set_deposit_out_index(&self, index: u64) {
        self.deposit_out_index.store(index, Ordering::SeqCst);
    }

    pub fn fail_create_deposit(&self, err: GatewayError) {
        *self.create_deposit_error.lock().unwrap() = Some(err);
    }

    pub fn fail_publish(&self, err: GatewayError) {
        *self.publish_error.lock().unwrap() = Some(err);
    }

    pub fn fail_payout(&self, err: GatewayError) {
        *self.payout_error.lock().unwrap() = Some(err);
    }

    pub fn create_deposit_calls(&self) -> u32 {
        self.create_deposit_calls.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> u32 {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn payout_calls(&self) -> u32 {
        self.payout_calls.load(Ordering::SeqCst)
    }

    pub fn visibility_calls(&self) -> u32 {
        self.visibility_calls.load(Ordering::SeqCst)
    }

    /// Sender side of the most recent confirmation subscription, for tests
    /// to feed depth updates.
    pub fn confirmation_sender(&self) -> Option<mpsc::Sender<u32>> {
        self.confirmation_tx.lock().unwrap().clone()
    }

    /// Drop the stored sender so the subscription ends without confirming.
    pub fn close_confirmations(&self) {
        *self.confirmation_tx.lock().unwrap() = None;
    }

    pub fn last_published(&self) -> Option<PublishedTx> {
        self.last_published.lock().unwrap().clone()
    }

    fn take_error(slot: &Mutex<Option<GatewayError>>) -> Option<GatewayError> {
        slot.lock().unwrap().take()
    }
}

#[async_trait]
impl WalletGateway for MockWallet {
    async fn create_partial_deposit(
        &self,
        trade_id: &TradeId,
        _input_amount: Amount,
        _taker_pub_key: &str,
        _arbitrator_pub_key: &str,
    ) -> Result<PartialDeposit, GatewayError> {
        self.create_deposit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = Self::take_error(&self.create_deposit_error) {
            return Err(err);
        }
        Ok(PartialDeposit {
            offerer_pub_key: "mock-offerer-pub-key".to_string(),
            tx_hex: format!("prepared-deposit-{trade_id}"),
            out_index: self.deposit_out_index.load(Ordering::SeqCst),
        })
    }

    async fn sign_and_publish_deposit(
        &self,
        prepared_offerer_tx_hex: &str,
        signed_taker_tx_hex: &str,
        _connecting_output_hex: &str,
        _script_sig_hex: &str,
        _offerer_tx_out_index: u64,
        _taker_tx_out_index: u64,
    ) -> Result<PublishedTx, GatewayError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = Self::take_error(&self.publish_error) {
            return Err(err);
        }
        let published = PublishedTx {
            tx_id: random_tx_id("deposit"),
            tx_hex: format!("{prepared_offerer_tx_hex}+{signed_taker_tx_hex}"),
        };
        *self.last_published.lock().unwrap() = Some(published.clone());
        Ok(published)
    }

    async fn create_and_sign_payout(
        &self,
        deposit_tx_id: &str,
        _offerer_payback: Amount,
        _taker_payback: Amount,
        _taker_payout_address: &str,
    ) -> Result<SignedPayout, GatewayError> {
        self.payout_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = Self::take_error(&self.payout_error) {
            return Err(err);
        }
        let deposit_tx_hex = self
            .last_published
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.tx_hex.clone())
            .unwrap_or_else(|| format!("deposit-hex-for-{deposit_tx_id}"));
        Ok(SignedPayout {
            deposit_tx_hex,
            signature_r: "mock-sig-r".to_string(),
            signature_s: "mock-sig-s".to_string(),
        })
    }

    async fn peer_visibility_count(&self, _tx_id: &str) -> Result<u32, GatewayError> {
        self.visibility_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.visibility.load(Ordering::SeqCst))
    }

    async fn subscribe_confirmations(
        &self,
        _tx_id: &str,
    ) -> Result<mpsc::Receiver<u32>, GatewayError> {
        let (tx, rx) = mpsc::channel(8);
        *self.confirmation_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

/// Records everything handed to it instead of hitting the network.
#[derive(Default)]
pub struct MockMessaging {
    sent: Mutex<Vec<(PeerAddress, TradeMessage)>>,
    send_error: Mutex<Option<GatewayError>>,
    send_calls: AtomicU32,
}

impl MockMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_send(&self, err: GatewayError) {
        *self.send_error.lock().unwrap() = Some(err);
    }

    pub fn send_calls(&self) -> u32 {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(PeerAddress, TradeMessage)> {
        self.sent.lock().unwrap().clone()
    }

    /// All recorded messages with the given wire name, in send order.
    pub fn sent_named(&self, name: &str) -> Vec<TradeMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, m)| m.name() == name)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

#[async_trait]
impl MessagingGateway for MockMessaging {
    async fn send(&self, peer: &PeerAddress, message: TradeMessage) -> Result<(), GatewayError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.send_error.lock().unwrap().take() {
            return Err(err);
        }
        self.sent.lock().unwrap().push((peer.clone(), message));
        Ok(())
    }
}

/// Accepts every account unless told to reject.
#[derive(Default)]
pub struct MockAccountVerifier {
    reject: AtomicBool,
    verify_calls: AtomicU32,
}

impl MockAccountVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_all(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn verify_calls(&self) -> u32 {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountVerifier for MockAccountVerifier {
    async fn verify_account(
        &self,
        account_id: &str,
        _bank_account: &BankAccount,
    ) -> Result<(), GatewayError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            return Err(GatewayError::IdentityMismatch {
                account_id: account_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Deterministic signer: the signature is the digest of the signed bytes,
/// so a test can recompute and compare it.
#[derive(Default)]
pub struct MockContractSigner {
    fail: AtomicBool,
    sign_calls: AtomicU32,
}

impl MockContractSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_signing(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sign_calls(&self) -> u32 {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn expected_signature(canonical_json: &str) -> String {
        hex::encode(Sha256::digest(canonical_json.as_bytes()))
    }
}

#[async_trait]
impl ContractSigner for MockContractSigner {
    async fn sign_contract(&self, canonical_json: &str) -> Result<String, GatewayError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::SigningFailed("signer unavailable".to_string()));
        }
        Ok(Self::expected_signature(canonical_json))
    }
}
