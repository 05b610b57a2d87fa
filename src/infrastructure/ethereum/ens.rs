//! ENS identity resolution for the connected account
//!
//! Reverse record first (`<addr>.addr.reverse` → name), confirmed by the
//! forward `addr` record, then the `avatar` text record of that name.
//! Missing records are normal and resolve to `None`.

use alloy::primitives::{keccak256, Address, B256};
use alloy::rpc::types::TransactionRequest;
use alloy_sol_types::SolCall;
use anyhow::{Context, Result};

use crate::infrastructure::ethereum::contracts::{IEnsRegistry, IEnsResolver};
use crate::infrastructure::ethereum::EthereumProvider;

/// ENS registry, deployed at the same address on mainnet and testnets
pub const ENS_REGISTRY: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// Resolved identity metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsIdentity {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

/// EIP-137 namehash
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(keccak256(label.as_bytes()).as_slice());
        node = keccak256(buf);
    }
    node
}

/// Node of the reverse record for `account`
pub fn reverse_node(account: Address) -> B256 {
    namehash(&format!("{}.addr.reverse", hex::encode(account.as_slice())))
}

/// Resolve name and avatar for `account`
pub async fn resolve_identity(
    provider: &dyn EthereumProvider,
    account: Address,
) -> Result<EnsIdentity> {
    let registry: Address = ENS_REGISTRY.parse().context("Invalid ENS registry address")?;

    let Some(name) = lookup_name(provider, registry, account).await? else {
        return Ok(EnsIdentity::default());
    };
    let avatar = lookup_text(provider, registry, &name, "avatar").await?;
    Ok(EnsIdentity {
        name: Some(name),
        avatar,
    })
}

async fn lookup_name(
    provider: &dyn EthereumProvider,
    registry: Address,
    account: Address,
) -> Result<Option<String>> {
    let node = reverse_node(account);
    let Some(resolver) = resolver_for(provider, registry, node).await? else {
        return Ok(None);
    };
    let data = eth_call(provider, resolver, IEnsResolver::nameCall { node }.abi_encode()).await?;
    let name = IEnsResolver::nameCall::abi_decode_returns(&data).context("Malformed name record")?;
    if name.trim().is_empty() {
        return Ok(None);
    }

    // A reverse record is only trusted when the name points back at the account.
    let forward = namehash(&name);
    let Some(forward_resolver) = resolver_for(provider, registry, forward).await? else {
        return Ok(None);
    };
    let data = eth_call(
        provider,
        forward_resolver,
        IEnsResolver::addrCall { node: forward }.abi_encode(),
    )
    .await?;
    let resolved = IEnsResolver::addrCall::abi_decode_returns(&data).context("Malformed addr record")?;
    if resolved != account {
        return Ok(None);
    }
    Ok(Some(name))
}

async fn lookup_text(
    provider: &dyn EthereumProvider,
    registry: Address,
    name: &str,
    key: &str,
) -> Result<Option<String>> {
    let node = namehash(name);
    let Some(resolver) = resolver_for(provider, registry, node).await? else {
        return Ok(None);
    };
    let call = IEnsResolver::textCall {
        node,
        key: key.to_string(),
    };
    let data = eth_call(provider, resolver, call.abi_encode()).await?;
    let value = IEnsResolver::textCall::abi_decode_returns(&data).context("Malformed text record")?;
    Ok(Some(value).filter(|value| !value.trim().is_empty()))
}

async fn resolver_for(
    provider: &dyn EthereumProvider,
    registry: Address,
    node: B256,
) -> Result<Option<Address>> {
    let data = eth_call(provider, registry, IEnsRegistry::resolverCall { node }.abi_encode()).await?;
    let resolver = IEnsRegistry::resolverCall::abi_decode_returns(&data)
        .context("Malformed resolver response")?;
    Ok(Some(resolver).filter(|resolver| !resolver.is_zero()))
}

async fn eth_call(
    provider: &dyn EthereumProvider,
    to: Address,
    calldata: Vec<u8>,
) -> Result<alloy::primitives::Bytes> {
    let request = TransactionRequest::default().to(to).input(calldata.into());
    provider.call(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namehash_vectors() {
        assert_eq!(namehash(""), B256::ZERO);
        assert_eq!(
            format!("{:?}", namehash("eth")),
            "0x93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
        assert_eq!(
            format!("{:?}", namehash("foo.eth")),
            "0xde9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
    }

    #[test]
    fn test_reverse_node_uses_lowercase_hex() {
        let account: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(
            reverse_node(account),
            namehash("f39fd6e51aad88f6f4ce6ab8827279cfffb92266.addr.reverse")
        );
    }

    #[test]
    fn test_registry_address_parses() {
        let registry: Address = ENS_REGISTRY.parse().unwrap();
        assert!(!registry.is_zero());
    }
}
