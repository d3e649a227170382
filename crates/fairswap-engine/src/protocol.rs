//! Orchestrator for the offerer-as-buyer role.
//!
//! Consumes exactly one message, UI event or confirmation event per state,
//! validates it, advances the cursor and dispatches the next task. The state
//! guard is the sole ordering mechanism: messages carry no sequence numbers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use fairswap_protocol::{
    payout_allocation, Amount, BankAccount, Contract, PayoutTxPublished, PeerAddress,
    RequestOffererPublishDepositTx, TakeOfferFeePaid, Trade, TradeMessage, TradeStatus, Validate,
};

use crate::error::{ProtocolError, TaskError};
use crate::events::ProtocolEvent;
use crate::gateway::{AccountVerifier, ContractSigner, MessagingGateway, PublishedTx, WalletGateway};
use crate::state::ProtocolState;
use crate::tasks;

/// Tunables of the execution protocol.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Peers that must have relayed the take-offer fee tx before we accept
    /// it as paid.
    pub min_peer_visibility: u32,
    /// Fee-visibility poll attempts before the task fails.
    pub fee_poll_attempts: u32,
    pub fee_poll_interval: Duration,
    /// Confirmation depth at which the deposit counts as included in chain.
    pub confirmation_depth: u32,
    /// Mining fee each party adds to their deposit input.
    pub tx_fee: Amount,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_peer_visibility: 3,
            fee_poll_attempts: 5,
            fee_poll_interval: Duration::from_millis(500),
            confirmation_depth: 1,
            tx_fee: Amount::from_sats(10_000),
        }
    }
}

/// The offerer's own identity data bound into the contract and messages.
#[derive(Debug, Clone)]
pub struct OffererIdentity {
    pub account_id: String,
    pub bank_account: BankAccount,
    /// Hex-encoded message-layer public key.
    pub message_pub_key: String,
    pub payout_address: String,
}

/// The four capabilities the protocol runs against. Shared services, safe
/// for concurrent use across trades.
#[derive(Clone)]
pub struct Gateways {
    pub wallet: Arc<dyn WalletGateway>,
    pub messaging: Arc<dyn MessagingGateway>,
    pub verifier: Arc<dyn AccountVerifier>,
    pub signer: Arc<dyn ContractSigner>,
}

/// State machine driving one trade from acceptance to payout or fault.
///
/// Logically single-threaded: all reads and writes of trade state happen
/// inside the currently active entry point. Callers must serialize entry
/// points per trade (see [`crate::driver`]).
pub struct BuyerProtocol {
    trade: Trade,
    peer: PeerAddress,
    identity: OffererIdentity,
    gateways: Gateways,
    config: ProtocolConfig,
    events: mpsc::UnboundedSender<ProtocolEvent>,
    state: ProtocolState,

    // written by tasks
    offerer_pub_key: Option<String>,
    prepared_deposit_tx_hex: Option<String>,
    offerer_tx_out_index: Option<u64>,
    deposit_tx: Option<PublishedTx>,
    pending_confirmations: Option<mpsc::Receiver<u32>>,

    // written by messages, read by tasks
    take_offer_fee_tx_id: Option<String>,
    taker_pub_key: Option<String>,
    taker_payout_address: Option<String>,
    taker_account_id: Option<String>,
    taker_bank_account: Option<BankAccount>,
    taker_message_pub_key: Option<String>,
    taker_contract_json: Option<String>,
    signed_taker_deposit_tx_hex: Option<String>,
    connecting_output_hex: Option<String>,
    script_sig_hex: Option<String>,
    taker_tx_out_index: Option<u64>,
}

impl BuyerProtocol {
    /// Create the protocol for a freshly accepted take-offer request and the
    /// event stream its milestones are published on.
    pub fn new(
        trade: Trade,
        peer: PeerAddress,
        identity: OffererIdentity,
        gateways: Gateways,
        config: ProtocolConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ProtocolEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let protocol = Self {
            trade,
            peer,
            identity,
            gateways,
            config,
            events,
            state: ProtocolState::Init,
            offerer_pub_key: None,
            prepared_deposit_tx_hex: None,
            offerer_tx_out_index: None,
            deposit_tx: None,
            pending_confirmations: None,
            take_offer_fee_tx_id: None,
            taker_pub_key: None,
            taker_payout_address: None,
            taker_account_id: None,
            taker_bank_account: None,
            taker_message_pub_key: None,
            taker_contract_json: None,
            signed_taker_deposit_tx_hex: None,
            connecting_output_hex: None,
            script_sig_hex: None,
            taker_tx_out_index: None,
        };
        (protocol, events_rx)
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn trade(&self) -> &Trade {
        &self.trade
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Output index of our deposit half, exactly as the wallet returned it.
    pub fn offerer_tx_out_index(&self) -> Option<u64> {
        self.offerer_tx_out_index
    }

    /// Output index of the taker's deposit half, exactly as received.
    pub fn taker_tx_out_index(&self) -> Option<u64> {
        self.taker_tx_out_index
    }

    /// Hand out the confirmation stream registered by the listener task, for
    /// the driver to forward qualifying depths back into the input queue.
    pub fn take_confirmation_stream(&mut self) -> Option<mpsc::Receiver<u32>> {
        self.pending_confirmations.take()
    }

    // ── Entry points ────────────────────────────────────────────────────────

    /// Begin the protocol: answer the pending take-offer request.
    pub async fn start(&mut self) -> Result<(), ProtocolError> {
        self.guard("start", ProtocolState::Init)?;
        self.advance(ProtocolState::HandleTakeOfferRequest);

        let result = tasks::handle_take_offer_request(
            self.gateways.messaging.as_ref(),
            &self.peer,
            self.trade.status,
            &self.trade.id,
        )
        .await;
        let accepted = result.map_err(|e| self.fault(e))?;

        if accepted {
            self.trade.status = TradeStatus::OffererAccepted;
            self.emit(ProtocolEvent::OfferAccepted {
                offer_id: self.trade.offer.id.clone(),
            });
            self.emit(ProtocolEvent::WaitingForPeer(self.state));
        } else {
            tracing::info!(trade_id = %self.trade.id, "offer no longer open, taker rejected");
        }
        Ok(())
    }

    /// The taker paid the take-offer fee and names the trade amount.
    pub async fn on_take_offer_fee_paid(
        &mut self,
        message: TakeOfferFeePaid,
    ) -> Result<(), ProtocolError> {
        message.validate()?;
        fairswap_protocol::expect_trade_id(&self.trade.id, &message.trade_id)?;
        self.guard("TakeOfferFeePaid", ProtocolState::HandleTakeOfferRequest)?;

        // apply new state
        self.take_offer_fee_tx_id = Some(message.fee_tx_id.clone());
        self.taker_pub_key = Some(message.taker_pub_key.clone());
        self.trade.take_offer_fee_tx_id = Some(message.fee_tx_id.clone());
        self.trade.trade_amount = message.trade_amount;

        self.advance(ProtocolState::VerifyTakeOfferFeePayment);
        let result = tasks::verify_take_offer_fee_payment(
            self.gateways.wallet.as_ref(),
            &message.fee_tx_id,
            self.config.min_peer_visibility,
            self.config.fee_poll_attempts,
            self.config.fee_poll_interval,
        )
        .await;
        result.map_err(|e| self.fault(e))?;

        self.advance(ProtocolState::CreateDepositTx);
        let input_amount = match self.trade.collateral.checked_add(self.config.tx_fee) {
            Some(amount) => amount,
            None => {
                return Err(self.fault(TaskError::Allocation(
                    fairswap_protocol::AmountError::Overflow("deposit input"),
                )))
            }
        };
        let result = tasks::create_deposit_tx(
            self.gateways.wallet.as_ref(),
            &self.trade.id,
            input_amount,
            &message.taker_pub_key,
            &self.trade.offer.arbitrator_pub_key,
        )
        .await;
        let deposit = result.map_err(|e| self.fault(e))?;
        self.offerer_pub_key = Some(deposit.offerer_pub_key.clone());
        self.prepared_deposit_tx_hex = Some(deposit.tx_hex.clone());
        self.offerer_tx_out_index = Some(deposit.out_index);

        self.advance(ProtocolState::RequestTakerDepositPayment);
        let result = tasks::request_taker_deposit_payment(
            self.gateways.messaging.as_ref(),
            &self.peer,
            &self.trade.id,
            &self.identity.bank_account,
            &self.identity.account_id,
            &deposit.offerer_pub_key,
            &deposit.tx_hex,
            deposit.out_index,
        )
        .await;
        result.map_err(|e| self.fault(e))?;

        self.emit(ProtocolEvent::WaitingForPeer(self.state));
        Ok(())
    }

    /// The taker funded their half of the deposit and asks us to verify,
    /// sign and publish.
    pub async fn on_request_offerer_publish_deposit_tx(
        &mut self,
        message: RequestOffererPublishDepositTx,
    ) -> Result<(), ProtocolError> {
        message.validate()?;
        fairswap_protocol::expect_trade_id(&self.trade.id, &message.trade_id)?;
        self.guard(
            "RequestOffererPublishDepositTx",
            ProtocolState::RequestTakerDepositPayment,
        )?;

        // apply new state
        self.taker_payout_address = Some(message.taker_payout_address.clone());
        self.taker_account_id = Some(message.taker_account_id.clone());
        self.taker_bank_account = Some(message.taker_bank_account.clone());
        self.taker_message_pub_key = Some(message.taker_message_pub_key.clone());
        self.taker_contract_json = Some(message.taker_contract_json.clone());
        self.signed_taker_deposit_tx_hex = Some(message.signed_taker_deposit_tx_hex.clone());
        self.connecting_output_hex = Some(message.connecting_output_hex.clone());
        self.script_sig_hex = Some(message.script_sig_hex.clone());
        self.taker_tx_out_index = Some(message.taker_tx_out_index);

        self.advance(ProtocolState::VerifyTakerAccount);
        let result = tasks::verify_taker_account(
            self.gateways.verifier.as_ref(),
            &message.taker_account_id,
            &message.taker_bank_account,
        )
        .await;
        result.map_err(|e| self.fault(e))?;

        self.advance(ProtocolState::VerifyAndSignContract);
        let contract = self.build_contract(&message)?;
        let result = tasks::verify_and_sign_contract(
            self.gateways.signer.as_ref(),
            contract,
            &message.taker_contract_json,
        )
        .await;
        let signed = result.map_err(|e| self.fault(e))?;
        self.trade.contract = Some(signed.contract);
        self.trade.contract_json = Some(signed.contract_json);
        self.trade.contract_signature = Some(signed.signature);

        self.advance(ProtocolState::SignAndPublishDepositTx);
        let prepared_tx_hex = self.required("prepared deposit", self.prepared_deposit_tx_hex.clone())?;
        let offerer_out_index = self.required("offerer out index", self.offerer_tx_out_index)?;
        let result = tasks::sign_and_publish_deposit_tx(
            self.gateways.wallet.as_ref(),
            &prepared_tx_hex,
            &message.signed_taker_deposit_tx_hex,
            &message.connecting_output_hex,
            &message.script_sig_hex,
            offerer_out_index,
            message.taker_tx_out_index,
        )
        .await;
        let deposit = result.map_err(|e| self.fault(e))?;
        self.trade.deposit_tx_id = Some(deposit.tx_id.clone());
        self.trade.status = TradeStatus::DepositPublished;
        self.emit(ProtocolEvent::DepositTxPublished {
            tx_id: deposit.tx_id.clone(),
        });
        self.deposit_tx = Some(deposit.clone());

        self.advance(ProtocolState::SendDepositTxIdToTaker);
        let result = tasks::send_deposit_tx_id_to_taker(
            self.gateways.messaging.as_ref(),
            &self.peer,
            &self.trade.id,
            &deposit,
        )
        .await;
        result.map_err(|e| self.fault(e))?;

        self.advance(ProtocolState::SetupListenerForBlockChainConfirmation);
        let result = tasks::setup_listener_for_blockchain_confirmation(
            self.gateways.wallet.as_ref(),
            &deposit.tx_id,
        )
        .await;
        let confirmations = result.map_err(|e| self.fault(e))?;
        self.pending_confirmations = Some(confirmations);

        self.advance(ProtocolState::WaitForDepositConfirmation);
        Ok(())
    }

    /// The deposit transaction reached the given confirmation depth.
    ///
    /// Depths below the configured threshold are ignored without advancing.
    pub async fn on_deposit_confirmed(&mut self, depth: u32) -> Result<(), ProtocolError> {
        self.guard("DepositConfirmed", ProtocolState::WaitForDepositConfirmation)?;
        if depth < self.config.confirmation_depth {
            tracing::debug!(depth, required = self.config.confirmation_depth, "depth below threshold");
            return Ok(());
        }

        let tx_id = self.required("deposit tx", self.trade.deposit_tx_id.clone())?;
        self.advance(ProtocolState::DepositConfirmed);
        self.trade.status = TradeStatus::DepositConfirmed;
        self.emit(ProtocolEvent::DepositConfirmed { tx_id, depth });
        self.emit(ProtocolEvent::WaitingForUser(self.state));
        Ok(())
    }

    /// The buyer confirmed (in the UI) that the off-chain payment was sent.
    /// There is no automatic detection; this is the one user-triggered
    /// resume point of the role.
    pub async fn on_ui_event_bank_transfer_inited(&mut self) -> Result<(), ProtocolError> {
        self.guard("BankTransferInited(UI)", ProtocolState::DepositConfirmed)?;

        self.advance(ProtocolState::SendSignedPayoutTx);
        self.trade.status = TradeStatus::PaymentStarted;

        let allocation = payout_allocation(self.trade.trade_amount, self.trade.collateral)
            .map_err(|e| self.fault(TaskError::Allocation(e)))?;
        let deposit_tx_id = self.required("deposit tx", self.trade.deposit_tx_id.clone())?;
        let taker_payout_address =
            self.required("taker payout address", self.taker_payout_address.clone())?;

        let result = tasks::send_signed_payout_tx(
            self.gateways.wallet.as_ref(),
            self.gateways.messaging.as_ref(),
            &self.peer,
            &self.trade.id,
            &deposit_tx_id,
            allocation.offerer_payback,
            allocation.taker_payback,
            &self.identity.payout_address,
            &taker_payout_address,
        )
        .await;
        result.map_err(|e| self.fault(e))?;

        self.emit(ProtocolEvent::WaitingForPeer(self.state));
        Ok(())
    }

    /// The taker completed and published the payout transaction.
    pub async fn on_payout_tx_published(
        &mut self,
        message: PayoutTxPublished,
    ) -> Result<(), ProtocolError> {
        message.validate()?;
        fairswap_protocol::expect_trade_id(&self.trade.id, &message.trade_id)?;
        self.guard("PayoutTxPublished", ProtocolState::SendSignedPayoutTx)?;

        self.advance(ProtocolState::Completed);
        self.trade.status = TradeStatus::PayoutPublished;
        self.emit(ProtocolEvent::PayoutTxPublished {
            payout_tx_hex: message.payout_tx_hex,
        });
        self.emit(ProtocolEvent::Completed(self.state));
        tracing::info!(trade_id = %self.trade.id, "trade completed");
        Ok(())
    }

    /// The wallet ended the confirmation subscription before the deposit
    /// confirmed. The trade cannot make progress without the chain event.
    pub fn on_confirmation_stream_closed(&mut self) -> Result<(), ProtocolError> {
        self.guard(
            "ConfirmationStreamClosed",
            ProtocolState::WaitForDepositConfirmation,
        )?;
        Err(self.fault(TaskError::ConfirmationStreamClosed))
    }

    /// A message arrived that this role never consumes.
    pub fn on_unexpected_message(&mut self, message: &TradeMessage) -> ProtocolError {
        let err = ProtocolError::UnexpectedMessage {
            message: message.name(),
            state: self.state,
        };
        tracing::error!(trade_id = %self.trade.id, %err, "unexpected message");
        self.emit(ProtocolEvent::Faulted {
            state: self.state,
            error: err.clone(),
        });
        err
    }

    // ── Private ─────────────────────────────────────────────────────────────

    /// Sequence guard: the event's required predecessor state must equal the
    /// current cursor. On mismatch the violation is published (loudly) and
    /// the cursor stays untouched.
    fn guard(&mut self, event: &'static str, expected: ProtocolState) -> Result<(), ProtocolError> {
        if self.state != expected {
            let err = ProtocolError::SequenceViolation {
                event,
                expected,
                actual: self.state,
            };
            tracing::error!(trade_id = %self.trade.id, %err, "protocol sequence violation");
            self.emit(ProtocolEvent::Faulted {
                state: self.state,
                error: err.clone(),
            });
            return Err(err);
        }
        Ok(())
    }

    /// Forward-only state assignment.
    fn advance(&mut self, next: ProtocolState) {
        debug_assert!(next > self.state, "state must only advance");
        tracing::debug!(trade_id = %self.trade.id, from = %self.state, to = %next, "state");
        self.state = next;
    }

    /// Single generic fault path: publish the failure with the state at the
    /// time it happened and park the trade for arbitration tooling.
    fn fault(&mut self, error: TaskError) -> ProtocolError {
        let failed_in = self.state;
        let err = ProtocolError::Task {
            state: failed_in,
            error,
        };
        tracing::error!(trade_id = %self.trade.id, %err, "task failed");
        self.trade.status = TradeStatus::Faulted;
        self.state = ProtocolState::Faulted;
        self.emit(ProtocolEvent::Faulted {
            state: failed_in,
            error: err.clone(),
        });
        err
    }

    /// A field the state machine guarantees to be present at this point.
    /// Absence is a state-machine bug and handled as a fault, not a panic.
    fn required<T>(&mut self, name: &'static str, value: Option<T>) -> Result<T, ProtocolError> {
        match value {
            Some(v) => Ok(v),
            None => Err(self.fault(TaskError::Gateway(
                crate::error::GatewayError::Wallet(format!("missing {name}")),
            ))),
        }
    }

    fn build_contract(
        &mut self,
        message: &RequestOffererPublishDepositTx,
    ) -> Result<Contract, ProtocolError> {
        let fee_tx_id = self.required("fee tx id", self.take_offer_fee_tx_id.clone())?;
        Ok(Contract {
            offer_id: self.trade.offer.id.clone(),
            trade_amount: self.trade.trade_amount,
            take_offer_fee_tx_id: fee_tx_id,
            offerer_account_id: self.identity.account_id.clone(),
            taker_account_id: message.taker_account_id.clone(),
            offerer_bank_account: self.identity.bank_account.clone(),
            taker_bank_account: message.taker_bank_account.clone(),
            offerer_message_pub_key: self.identity.message_pub_key.clone(),
            taker_message_pub_key: message.taker_message_pub_key.clone(),
        })
    }

    fn emit(&self, event: ProtocolEvent) {
        // The manager dropping its receiver must not break the trade.
        let _ = self.events.send(event);
    }
}
