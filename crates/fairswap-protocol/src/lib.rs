//! fairswap protocol - wire contract and domain model for escrowed trades.
//!
//! Defines the seven peer messages exchanged while executing a trade against
//! a 2-of-3 multisig deposit, the validation gate every inbound message must
//! pass before any field reaches trade state, and the canonical contract
//! encoding both parties must reproduce byte-identically.

pub mod contract;
pub mod error;
pub mod messages;
pub mod types;
pub mod validate;

pub use contract::*;
pub use error::*;
pub use messages::*;
pub use types::*;
pub use validate::*;
