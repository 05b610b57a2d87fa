//! Domain models for the token dashboard
//!
//! Everything here is synchronous and free of I/O:
//! - address validation
//! - the watched address list
//! - read planning and result snapshots
//! - the wallet connection gate
//! - poll scheduling

pub mod address;
pub mod connection;
pub mod plan;
pub mod poll;
pub mod watchlist;

pub use address::{validate, TokenAddress, ValidationError, INVALID_ADDRESS_MESSAGE};
pub use connection::{ConnectionGate, ConnectionState, Identity};
pub use plan::{plan, BatchSnapshot, CardValues, ReadFunction, ReadRequest, ReadResult};
pub use poll::{gate_open, PollScheduler, PollTicket, DEFAULT_POLL_INTERVAL};
pub use watchlist::Watchlist;
