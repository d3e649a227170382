#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use fairswap_engine::gateway::{
    AccountVerifier, ContractSigner, MessagingGateway, WalletGateway,
};
use fairswap_engine::mock::{MockAccountVerifier, MockContractSigner, MockMessaging, MockWallet};
use fairswap_engine::protocol::{BuyerProtocol, Gateways, OffererIdentity, ProtocolConfig};
use fairswap_engine::ProtocolEvent;
use fairswap_protocol::{
    Amount, BankAccount, Contract, Offer, PayoutTxPublished, PeerAddress,
    RequestOffererPublishDepositTx, TakeOfferFeePaid, Trade, TradeId,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Opt-in log output for debugging test runs, driven by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Next event off the channel, bounded so a hung trade fails the test.
pub async fn next_event(rx: &mut UnboundedReceiver<ProtocolEvent>) -> ProtocolEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

pub const TRADE_AMOUNT: u64 = 50_000_000;
pub const COLLATERAL: u64 = 10_000_000;
pub const FEE_TX_ID: &str = "fee-tx-0001";
pub const TAKER_PUB_KEY: &str = "taker-pub-key";
pub const TAKER_ACCOUNT_ID: &str = "taker-account-7";
pub const TAKER_MESSAGE_PUB_KEY: &str = "taker-message-pub-key";
pub const TAKER_PAYOUT_ADDRESS: &str = "taker-payout-address";

pub struct Fixture {
    pub wallet: Arc<MockWallet>,
    pub messaging: Arc<MockMessaging>,
    pub verifier: Arc<MockAccountVerifier>,
    pub signer: Arc<MockContractSigner>,
    pub trade: Trade,
    pub peer: PeerAddress,
    pub identity: OffererIdentity,
    pub config: ProtocolConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let offer = Offer {
            id: "offer-42".to_string(),
            arbitrator_pub_key: "arbitrator-pub-key".to_string(),
            bank_account_id: "offerer-bank-1".to_string(),
            currency_code: "EUR".to_string(),
            price: 52_000,
        };
        let trade = Trade::new(
            TradeId::new("trade-0001"),
            offer,
            Amount::from_sats(COLLATERAL),
        );
        let identity = OffererIdentity {
            account_id: "offerer-account-1".to_string(),
            bank_account: offerer_bank_account(),
            message_pub_key: "offerer-message-pub-key".to_string(),
            payout_address: "offerer-payout-address".to_string(),
        };
        // Short poll interval so visibility failures resolve quickly.
        let config = ProtocolConfig {
            fee_poll_attempts: 2,
            fee_poll_interval: Duration::from_millis(5),
            ..ProtocolConfig::default()
        };
        Self {
            wallet: Arc::new(MockWallet::new()),
            messaging: Arc::new(MockMessaging::new()),
            verifier: Arc::new(MockAccountVerifier::new()),
            signer: Arc::new(MockContractSigner::new()),
            trade,
            peer: PeerAddress::new("taker.onion:9999"),
            identity,
            config,
        }
    }

    pub fn gateways(&self) -> Gateways {
        Gateways {
            wallet: self.wallet.clone() as Arc<dyn WalletGateway>,
            messaging: self.messaging.clone() as Arc<dyn MessagingGateway>,
            verifier: self.verifier.clone() as Arc<dyn AccountVerifier>,
            signer: self.signer.clone() as Arc<dyn ContractSigner>,
        }
    }

    pub fn protocol(&self) -> (BuyerProtocol, UnboundedReceiver<ProtocolEvent>) {
        BuyerProtocol::new(
            self.trade.clone(),
            self.peer.clone(),
            self.identity.clone(),
            self.gateways(),
            self.config.clone(),
        )
    }

    /// The contract both parties derive for this fixture, in canonical form.
    pub fn contract_json(&self) -> String {
        Contract {
            offer_id: self.trade.offer.id.clone(),
            trade_amount: Amount::from_sats(TRADE_AMOUNT),
            take_offer_fee_tx_id: FEE_TX_ID.to_string(),
            offerer_account_id: self.identity.account_id.clone(),
            taker_account_id: TAKER_ACCOUNT_ID.to_string(),
            offerer_bank_account: self.identity.bank_account.clone(),
            taker_bank_account: taker_bank_account(),
            offerer_message_pub_key: self.identity.message_pub_key.clone(),
            taker_message_pub_key: TAKER_MESSAGE_PUB_KEY.to_string(),
        }
        .canonical_json()
    }

    pub fn fee_paid(&self) -> TakeOfferFeePaid {
        TakeOfferFeePaid {
            trade_id: self.trade.id.clone(),
            fee_tx_id: FEE_TX_ID.to_string(),
            trade_amount: Amount::from_sats(TRADE_AMOUNT),
            taker_pub_key: TAKER_PUB_KEY.to_string(),
        }
    }

    pub fn publish_request(&self) -> RequestOffererPublishDepositTx {
        RequestOffererPublishDepositTx {
            trade_id: self.trade.id.clone(),
            taker_payout_address: TAKER_PAYOUT_ADDRESS.to_string(),
            taker_account_id: TAKER_ACCOUNT_ID.to_string(),
            taker_bank_account: taker_bank_account(),
            taker_message_pub_key: TAKER_MESSAGE_PUB_KEY.to_string(),
            taker_contract_json: self.contract_json(),
            signed_taker_deposit_tx_hex: "signed-taker-deposit-hex".to_string(),
            connecting_output_hex: "connecting-output-hex".to_string(),
            script_sig_hex: "script-sig-hex".to_string(),
            taker_tx_out_index: 1,
        }
    }

    pub fn payout_published(&self) -> PayoutTxPublished {
        PayoutTxPublished {
            trade_id: self.trade.id.clone(),
            payout_tx_hex: "published-payout-hex".to_string(),
        }
    }
}

pub fn offerer_bank_account() -> BankAccount {
    BankAccount {
        holder_name: "Alice Offerer".to_string(),
        primary_id: "DE02120300000000202051".to_string(),
        secondary_id: "BYLADEM1001".to_string(),
        country_code: "DE".to_string(),
        currency_code: "EUR".to_string(),
    }
}

pub fn taker_bank_account() -> BankAccount {
    BankAccount {
        holder_name: "Bob Taker".to_string(),
        primary_id: "AT483200000012345864".to_string(),
        secondary_id: "RLNWATWW".to_string(),
        country_code: "AT".to_string(),
        currency_code: "EUR".to_string(),
    }
}

/// Drive a fresh protocol through acceptance and the fee message, leaving it
/// waiting for the taker's deposit half.
pub async fn run_to_awaiting_taker_deposit(fixture: &Fixture, protocol: &mut BuyerProtocol) {
    protocol.start().await.expect("start");
    protocol
        .on_take_offer_fee_paid(fixture.fee_paid())
        .await
        .expect("fee message");
}

/// Continue through deposit publication and one qualifying confirmation,
/// leaving the protocol waiting for the buyer's bank-transfer confirmation.
pub async fn run_to_deposit_confirmed(fixture: &Fixture, protocol: &mut BuyerProtocol) {
    run_to_awaiting_taker_deposit(fixture, protocol).await;
    protocol
        .on_request_offerer_publish_deposit_tx(fixture.publish_request())
        .await
        .expect("publish request");
    protocol.on_deposit_confirmed(1).await.expect("confirmation");
}
