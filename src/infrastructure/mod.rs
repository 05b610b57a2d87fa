//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Alloy-based Ethereum provider implementations
//! - Contract bindings, batched reads and ENS lookups
//! - Wallet connectors
//! - Tokio runtime bridge for async operations

pub mod ethereum;
pub mod runtime;
pub mod wallet;

pub use runtime::{RuntimeBridge, RuntimeCommand, RuntimeEvent, WorkerSettings};
pub use wallet::{ConnectorKind, ConnectorOption};
