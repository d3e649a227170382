//! Per-trade serialization of callbacks.
//!
//! Gateways run on shared workers servicing many trades; delivery back into
//! one trade's orchestrator must be serialized. The driver owns the
//! [`BuyerProtocol`] and consumes a single queue of inputs, so two callbacks
//! can never advance the same trade concurrently. The deposit-confirmation
//! listener feeds the same queue.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use fairswap_protocol::TradeMessage;

use crate::protocol::BuyerProtocol;

/// One unit of work for a trade: a peer message, the UI resume event, a
/// confirmation event, or lifecycle control.
#[derive(Debug)]
pub enum ProtocolInput {
    Start,
    Message(TradeMessage),
    BankTransferInited,
    DepositConfirmed { depth: u32 },
    /// The confirmation stream ended before any qualifying depth arrived.
    ConfirmationsLost,
    Shutdown,
}

/// Cheap handle for feeding inputs into a running trade.
#[derive(Clone)]
pub struct ProtocolHandle {
    tx: mpsc::UnboundedSender<ProtocolInput>,
}

impl ProtocolHandle {
    pub fn start(&self) {
        let _ = self.tx.send(ProtocolInput::Start);
    }

    pub fn deliver(&self, message: TradeMessage) {
        let _ = self.tx.send(ProtocolInput::Message(message));
    }

    pub fn bank_transfer_inited(&self) {
        let _ = self.tx.send(ProtocolInput::BankTransferInited);
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(ProtocolInput::Shutdown);
    }
}

/// Spawn the driver loop for one trade. Returns the input handle and the
/// join handle resolving to the protocol (with its trade) once the loop
/// ends: on completion, on shutdown, or when all handles are dropped.
pub fn spawn(mut protocol: BuyerProtocol) -> (ProtocolHandle, JoinHandle<BuyerProtocol>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = ProtocolHandle { tx: tx.clone() };

    let join = tokio::spawn(async move {
        while let Some(input) = rx.recv().await {
            match input {
                ProtocolInput::Start => {
                    log_outcome(protocol.start().await);
                }
                ProtocolInput::Message(message) => {
                    let result = match message {
                        TradeMessage::TakeOfferFeePaid(m) => {
                            protocol.on_take_offer_fee_paid(m).await
                        }
                        TradeMessage::RequestOffererPublishDepositTx(m) => {
                            protocol.on_request_offerer_publish_deposit_tx(m).await
                        }
                        TradeMessage::PayoutTxPublished(m) => {
                            protocol.on_payout_tx_published(m).await
                        }
                        other => Err(protocol.on_unexpected_message(&other)),
                    };
                    log_outcome(result);
                }
                ProtocolInput::BankTransferInited => {
                    log_outcome(protocol.on_ui_event_bank_transfer_inited().await);
                }
                ProtocolInput::DepositConfirmed { depth } => {
                    log_outcome(protocol.on_deposit_confirmed(depth).await);
                }
                ProtocolInput::ConfirmationsLost => {
                    log_outcome(protocol.on_confirmation_stream_closed());
                }
                ProtocolInput::Shutdown => break,
            }

            // A freshly registered confirmation stream is forwarded into our
            // own queue so the wait never blocks input processing.
            if let Some(mut confirmations) = protocol.take_confirmation_stream() {
                let tx = tx.clone();
                let required = protocol.config().confirmation_depth;
                tokio::spawn(async move {
                    loop {
                        match confirmations.recv().await {
                            Some(depth) if depth >= required => {
                                let _ = tx.send(ProtocolInput::DepositConfirmed { depth });
                                break;
                            }
                            Some(_) => {}
                            None => {
                                let _ = tx.send(ProtocolInput::ConfirmationsLost);
                                break;
                            }
                        }
                    }
                });
            }

            if protocol.state().is_terminal() {
                break;
            }
        }
        protocol
    });

    (handle, join)
}

fn log_outcome(result: Result<(), crate::error::ProtocolError>) {
    match result {
        Ok(()) => {}
        Err(err) if err.is_transient() => {
            tracing::warn!(%err, "message rejected at the validation gate");
        }
        Err(err) => {
            tracing::error!(%err, "protocol input failed");
        }
    }
}
