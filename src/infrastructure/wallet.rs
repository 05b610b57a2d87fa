//! Wallet connectors
//!
//! A connector turns a user choice into a connected account address. The
//! dashboard never signs anything, so a connector only has to produce an
//! address the node or the user vouches for.

use alloy::primitives::Address;
use anyhow::{Context, Result};

use crate::domain::validate;
use crate::infrastructure::ethereum::EthereumProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorKind {
    /// First account exposed by the node (`eth_accounts`)
    NodeAccounts,
    /// A fixed, watch-only account
    Watch { address: String },
}

/// A connector the user can pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorOption {
    pub name: String,
    pub kind: ConnectorKind,
}

impl ConnectorOption {
    pub fn node_accounts() -> Self {
        Self {
            name: "Node accounts".to_string(),
            kind: ConnectorKind::NodeAccounts,
        }
    }

    pub fn watch(address: impl Into<String>, label: Option<String>) -> Self {
        let address = address.into();
        let name = match label.filter(|label| !label.trim().is_empty()) {
            Some(label) => format!("Watch {label}"),
            None => format!("Watch {address}"),
        };
        Self {
            name,
            kind: ConnectorKind::Watch { address },
        }
    }
}

/// Build the connector list: node accounts first, then each watch account.
///
/// Watch accounts that are not well-formed addresses are skipped.
pub fn connector_options<'a>(
    watch_accounts: impl IntoIterator<Item = (&'a str, Option<String>)>,
) -> Vec<ConnectorOption> {
    let mut options = vec![ConnectorOption::node_accounts()];
    for (address, label) in watch_accounts {
        let address = address.trim();
        if validate(address).is_err() {
            tracing::warn!(%address, "skipping malformed watch account");
            continue;
        }
        if options
            .iter()
            .any(|opt| matches!(&opt.kind, ConnectorKind::Watch { address: a } if a.eq_ignore_ascii_case(address)))
        {
            continue;
        }
        options.push(ConnectorOption::watch(address, label));
    }
    options
}

/// Activate a connector and return the connected account
pub async fn activate(provider: Option<&dyn EthereumProvider>, kind: &ConnectorKind) -> Result<Address> {
    match kind {
        ConnectorKind::NodeAccounts => {
            let provider = provider.context("No RPC endpoint connected")?;
            let accounts = provider
                .accounts()
                .await
                .context("Failed to list node accounts")?;
            accounts
                .first()
                .copied()
                .context("Node exposes no accounts")
        }
        ConnectorKind::Watch { address } => {
            let token = validate(address).map_err(|_| anyhow::anyhow!("Invalid watch address {address}"))?;
            Ok(token.address())
        }
    }
}

/// Whether `account` is still offered by the connector.
///
/// Watch accounts never go away; node accounts are re-listed.
pub async fn still_connected(
    provider: &dyn EthereumProvider,
    kind: &ConnectorKind,
    account: Address,
) -> Result<bool> {
    match kind {
        ConnectorKind::NodeAccounts => Ok(provider.accounts().await?.contains(&account)),
        ConnectorKind::Watch { .. } => Ok(true),
    }
}
