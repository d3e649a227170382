//! fairswap engine - executes one escrowed trade for the offerer-as-buyer.
//!
//! The engine drives a trade from offer acceptance to payout (or to a
//! reported fault) by serially dispatching stateless tasks against four
//! gateway capabilities: wallet, peer messaging, account verification and
//! contract signing. Incoming peer messages pass the validation gate, are
//! checked against the expected predecessor state, and only then advance the
//! [`ProtocolState`] cursor. Milestones are published as [`ProtocolEvent`]
//! values over a channel consumed by the surrounding trade manager.
//!
//! Each trade is logically single-threaded: the [`driver`] module provides a
//! per-trade input queue that serializes message, UI and confirmation
//! callbacks even when the gateways themselves service many trades from a
//! shared pool.

pub mod driver;
pub mod error;
pub mod events;
pub mod gateway;
pub mod mock;
pub mod protocol;
pub mod state;
pub mod tasks;

pub use driver::*;
pub use error::*;
pub use events::*;
pub use gateway::*;
pub use protocol::*;
pub use state::*;
