//! Validation gate for inbound peer messages.
//!
//! Every field of a message must pass here before it is copied into trade
//! state. A failure never mutates the orchestrator; the counterpart may
//! retransmit a corrected message.

use crate::error::ValidationError;
use crate::messages::*;
use crate::types::{Amount, BankAccount, TradeId};

/// Field-level checks a message must pass before admission.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

pub fn non_empty(name: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(name));
    }
    Ok(())
}

pub fn non_zero(name: &'static str, value: Amount) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::ZeroAmount(name));
    }
    Ok(())
}

fn valid_trade_id(trade_id: &TradeId) -> Result<(), ValidationError> {
    non_empty("trade_id", trade_id.as_str())
}

fn valid_bank_account(account: &BankAccount) -> Result<(), ValidationError> {
    // Any blank field leaves the account unverifiable against the ledger.
    non_empty("bank_account.holder_name", &account.holder_name)?;
    non_empty("bank_account.primary_id", &account.primary_id)?;
    non_empty("bank_account.secondary_id", &account.secondary_id)?;
    non_empty("bank_account.country_code", &account.country_code)?;
    non_empty("bank_account.currency_code", &account.currency_code)
}

/// Checks that a message is addressed to the given trade.
pub fn expect_trade_id(expected: &TradeId, got: &TradeId) -> Result<(), ValidationError> {
    if expected != got {
        return Err(ValidationError::TradeIdMismatch {
            expected: expected.to_string(),
            got: got.to_string(),
        });
    }
    Ok(())
}

impl Validate for RespondToTakeOfferRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        valid_trade_id(&self.trade_id)
    }
}

impl Validate for TakeOfferFeePaid {
    fn validate(&self) -> Result<(), ValidationError> {
        valid_trade_id(&self.trade_id)?;
        non_empty("fee_tx_id", &self.fee_tx_id)?;
        non_zero("trade_amount", self.trade_amount)?;
        non_empty("taker_pub_key", &self.taker_pub_key)
    }
}

impl Validate for RequestOffererPublishDepositTx {
    fn validate(&self) -> Result<(), ValidationError> {
        valid_trade_id(&self.trade_id)?;
        non_empty("taker_payout_address", &self.taker_payout_address)?;
        non_empty("taker_account_id", &self.taker_account_id)?;
        valid_bank_account(&self.taker_bank_account)?;
        non_empty("taker_message_pub_key", &self.taker_message_pub_key)?;
        non_empty("taker_contract_json", &self.taker_contract_json)?;
        non_empty("signed_taker_deposit_tx_hex", &self.signed_taker_deposit_tx_hex)?;
        non_empty("connecting_output_hex", &self.connecting_output_hex)?;
        non_empty("script_sig_hex", &self.script_sig_hex)
        // taker_tx_out_index is an opaque index; zero is legitimate.
    }
}

impl Validate for DepositTxPublished {
    fn validate(&self) -> Result<(), ValidationError> {
        valid_trade_id(&self.trade_id)?;
        non_empty("deposit_tx_hex", &self.deposit_tx_hex)
    }
}

impl Validate for RequestTakerDepositPayment {
    fn validate(&self) -> Result<(), ValidationError> {
        valid_trade_id(&self.trade_id)?;
        valid_bank_account(&self.bank_account)?;
        non_empty("account_id", &self.account_id)?;
        non_empty("offerer_pub_key", &self.offerer_pub_key)?;
        non_empty("prepared_deposit_tx_hex", &self.prepared_deposit_tx_hex)
    }
}

impl Validate for BankTransferInited {
    fn validate(&self) -> Result<(), ValidationError> {
        valid_trade_id(&self.trade_id)?;
        non_empty("deposit_tx_hex", &self.deposit_tx_hex)?;
        non_empty("offerer_signature_r", &self.offerer_signature_r)?;
        non_empty("offerer_signature_s", &self.offerer_signature_s)?;
        non_zero("offerer_payback_amount", self.offerer_payback_amount)?;
        non_zero("taker_payback_amount", self.taker_payback_amount)?;
        non_empty("offerer_payout_address", &self.offerer_payout_address)
    }
}

impl Validate for PayoutTxPublished {
    fn validate(&self) -> Result<(), ValidationError> {
        valid_trade_id(&self.trade_id)?;
        non_empty("payout_tx_hex", &self.payout_tx_hex)
    }
}

impl Validate for TradeMessage {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::RespondToTakeOfferRequest(m) => m.validate(),
            Self::TakeOfferFeePaid(m) => m.validate(),
            Self::RequestOffererPublishDepositTx(m) => m.validate(),
            Self::DepositTxPublished(m) => m.validate(),
            Self::RequestTakerDepositPayment(m) => m.validate(),
            Self::BankTransferInited(m) => m.validate(),
            Self::PayoutTxPublished(m) => m.validate(),
        }
    }
}
