//! Ethereum infrastructure - Alloy provider, contract bindings, batched reads

pub mod batch;
pub mod contracts;
pub mod ens;
mod provider;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchReader, BatchStrategy};
pub use ens::{resolve_identity, EnsIdentity};
pub use provider::{create_provider, detect_node_kind, EthereumProvider, ProviderConfig};
