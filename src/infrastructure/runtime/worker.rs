//! Async worker - runs in Tokio runtime and handles RPC operations

use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::ReadRequest;
use crate::infrastructure::ethereum::{
    create_provider, detect_node_kind, resolve_identity, BatchReader, EthereumProvider,
    ProviderConfig,
};
use crate::infrastructure::runtime::bridge::{RuntimeCommand, RuntimeEvent};
use crate::infrastructure::wallet::{self, ConnectorKind};

/// Worker tuning
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub reader: BatchReader,
    pub resolve_ens: bool,
    /// How often the endpoint and the connected account are re-checked
    pub health_interval: Duration,
}

/// Background work the loop started, reported back when it finishes
enum Outcome {
    Endpoint {
        generation: u64,
        config: ProviderConfig,
        result: Result<ReadyEndpoint>,
    },
    Wallet {
        session: u64,
        kind: ConnectorKind,
        account: Address,
    },
    Health {
        generation: u64,
        account: Option<Address>,
        result: Result<bool>,
    },
}

struct ReadyEndpoint {
    provider: Box<dyn EthereumProvider>,
    node_kind: String,
    chain_id: Option<u64>,
}

/// Run the async worker loop.
///
/// Nothing that talks to the node is awaited here. Connects, wallet
/// activation and health checks run as tasks bounded by the request timeout
/// and report back through an [`Outcome`], so commands keep flowing while an
/// endpoint is slow.
pub async fn run_async_worker(
    endpoints: Vec<ProviderConfig>,
    settings: WorkerSettings,
    cmd_rx: Receiver<RuntimeCommand>,
    evt_tx: Sender<RuntimeEvent>,
) -> Result<()> {
    if endpoints.is_empty() {
        anyhow::bail!("No endpoints configured");
    }

    let timeout = settings.reader.timeout;
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<Outcome>();

    let mut endpoint_index = 0usize;
    let mut provider: Option<Arc<dyn EthereumProvider>> = None;
    // Bumped whenever the provider is replaced; older outcomes are ignored
    let mut generation = 0u64;
    let mut connecting = false;
    let mut retry_at: Option<Instant> = None;
    // Bumped on every connect and disconnect request
    let mut session = 0u64;
    let mut wallet: Option<(ConnectorKind, Address)> = None;
    let mut health_pending = false;
    let mut last_health_check = Instant::now();

    loop {
        // Start a connection attempt if there is no provider
        if provider.is_none() && !connecting && retry_at.map_or(true, |at| Instant::now() >= at) {
            connecting = true;
            let config = endpoints[endpoint_index].clone();
            let outcome_tx = outcome_tx.clone();
            tokio::spawn(async move {
                let result = tokio::time::timeout(timeout, connect_to_endpoint(config.clone()))
                    .await
                    .unwrap_or_else(|_| Err(anyhow::anyhow!("No response within {:?}", timeout)));
                let _ = outcome_tx.send(Outcome::Endpoint {
                    generation,
                    config,
                    result,
                });
            });
        }

        // Apply finished background work
        while let Ok(outcome) = outcome_rx.try_recv() {
            match outcome {
                Outcome::Endpoint {
                    generation: started,
                    config,
                    result,
                } => {
                    if started != generation {
                        continue;
                    }
                    connecting = false;
                    match result {
                        Ok(ready) => {
                            info!(endpoint = %ready.provider.endpoint_name(), node_kind = %ready.node_kind, chain_id = ?ready.chain_id, "endpoint ready");
                            let _ = evt_tx.send(RuntimeEvent::EndpointReady {
                                endpoint: ready.provider.endpoint_name(),
                                node_kind: ready.node_kind,
                                chain_id: ready.chain_id,
                            });
                            provider = Some(Arc::from(ready.provider));
                            retry_at = None;
                            last_health_check = Instant::now();
                        }
                        Err(err) => {
                            warn!(endpoint = %config.display(), error = %format!("{err:#}"), "connection failed");
                            let _ = evt_tx.send(RuntimeEvent::Error {
                                message: format!("Connection failed ({}): {:#}", config.display(), err),
                            });

                            // Try next endpoint if available
                            if endpoints.len() > 1 {
                                endpoint_index = (endpoint_index + 1) % endpoints.len();
                            }
                            retry_at = Some(Instant::now() + Duration::from_millis(900));
                        }
                    }
                }

                Outcome::Wallet {
                    session: started,
                    kind,
                    account,
                } => {
                    if started == session {
                        wallet = Some((kind, account));
                    }
                }

                Outcome::Health {
                    generation: started,
                    account,
                    result,
                } => {
                    health_pending = false;
                    if started != generation {
                        continue;
                    }
                    match result {
                        Ok(true) => {}
                        Ok(false) => {
                            let current = wallet.as_ref().map(|(_, addr)| *addr);
                            if account.is_some() && current == account {
                                info!(account = ?account, "account no longer offered by node");
                                wallet = None;
                                let _ = evt_tx.send(RuntimeEvent::WalletDisconnected {
                                    reason: "Account no longer available".to_string(),
                                });
                            }
                        }
                        Err(err) => {
                            let _ = evt_tx.send(RuntimeEvent::Error {
                                message: format!("RPC error: {:#}", err),
                            });
                            provider = None;
                            generation += 1;

                            // Try next endpoint
                            if endpoints.len() > 1 {
                                endpoint_index = (endpoint_index + 1) % endpoints.len();
                            }
                        }
                    }
                }
            }
        }

        // Process commands (non-blocking)
        loop {
            let cmd = match cmd_rx.try_recv() {
                Ok(cmd) => cmd,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("command channel closed");
                    return Ok(());
                }
            };
            match cmd {
                RuntimeCommand::Shutdown => {
                    info!("worker shutting down");
                    return Ok(());
                }

                RuntimeCommand::SwitchEndpoint { index } => {
                    if index >= endpoints.len() {
                        let _ = evt_tx.send(RuntimeEvent::Error {
                            message: format!(
                                "Invalid endpoint index {} ({} total)",
                                index,
                                endpoints.len()
                            ),
                        });
                        continue;
                    }
                    endpoint_index = index;
                    provider = None;
                    generation += 1;
                    connecting = false;
                    retry_at = None;
                }

                RuntimeCommand::Connect { connector } => {
                    session += 1;
                    let started = session;
                    let p = provider.clone();
                    let evt_tx = evt_tx.clone();
                    let outcome_tx = outcome_tx.clone();
                    tokio::spawn(async move {
                        let attempt = tokio::time::timeout(
                            timeout,
                            wallet::activate(p.as_deref(), &connector.kind),
                        )
                        .await
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("Connector timed out")));

                        match attempt {
                            Ok(account) => {
                                info!(connector = %connector.name, %account, "wallet connected");
                                let _ = outcome_tx.send(Outcome::Wallet {
                                    session: started,
                                    kind: connector.kind,
                                    account,
                                });
                                let _ = evt_tx.send(RuntimeEvent::WalletConnected {
                                    connector: connector.name,
                                    address: account.to_checksum(None),
                                });
                            }
                            Err(err) => {
                                warn!(connector = %connector.name, error = %format!("{err:#}"), "wallet connect failed");
                                let _ = evt_tx.send(RuntimeEvent::WalletConnectFailed {
                                    connector: connector.name,
                                    message: format!("{:#}", err),
                                });
                            }
                        }
                    });
                }

                RuntimeCommand::Disconnect => {
                    session += 1;
                    wallet = None;
                }

                RuntimeCommand::ReadBatch { id, plan } => match provider.clone() {
                    Some(p) => {
                        let reader = settings.reader.clone();
                        let evt_tx = evt_tx.clone();
                        tokio::spawn(async move {
                            let event = execute_batch(p.as_ref(), &reader, id, &plan).await;
                            let _ = evt_tx.send(event);
                        });
                    }
                    None => {
                        let _ = evt_tx.send(RuntimeEvent::BatchFailed {
                            id,
                            message: "No RPC endpoint connected".to_string(),
                        });
                    }
                },

                RuntimeCommand::ResolveIdentity { address } => {
                    if !settings.resolve_ens {
                        continue;
                    }
                    let Some(p) = provider.clone() else {
                        continue;
                    };
                    let evt_tx = evt_tx.clone();
                    tokio::spawn(async move {
                        let event = lookup_identity(p.as_ref(), address, timeout).await;
                        let _ = evt_tx.send(event);
                    });
                }
            }
        }

        // Periodic endpoint and account check
        if let Some(p) = provider.clone() {
            if !health_pending && last_health_check.elapsed() >= settings.health_interval {
                health_pending = true;
                last_health_check = Instant::now();
                let watched = wallet.clone();
                let outcome_tx = outcome_tx.clone();
                tokio::spawn(async move {
                    let account = watched.as_ref().map(|(_, addr)| *addr);
                    let result = tokio::time::timeout(timeout, check_health(p.as_ref(), watched))
                        .await
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("No response within {:?}", timeout)));
                    let _ = outcome_tx.send(Outcome::Health {
                        generation,
                        account,
                        result,
                    });
                });
            }
        }

        // Small yield to prevent busy loop
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Connect to an endpoint and find out what kind of node it is
async fn connect_to_endpoint(config: ProviderConfig) -> Result<ReadyEndpoint> {
    let provider = create_provider(config).await?;

    let client_version = provider
        .client_version()
        .await
        .context("Failed to get client version")?;
    let node_kind = detect_node_kind(&client_version);
    let chain_id = provider.chain_id().await.ok();

    Ok(ReadyEndpoint {
        provider,
        node_kind,
        chain_id,
    })
}

/// Endpoint liveness, then whether the connected account is still offered.
///
/// Account lookup errors count as still connected; only the endpoint
/// failing is an error.
async fn check_health(
    provider: &dyn EthereumProvider,
    wallet: Option<(ConnectorKind, Address)>,
) -> Result<bool> {
    provider.chain_id().await.context("Health check failed")?;
    match wallet {
        Some((kind, account)) => Ok(wallet::still_connected(provider, &kind, account)
            .await
            .unwrap_or(true)),
        None => Ok(true),
    }
}

/// Execute one read batch and turn the outcome into an event
pub async fn execute_batch(
    provider: &dyn EthereumProvider,
    reader: &BatchReader,
    id: u64,
    plan: &[ReadRequest],
) -> RuntimeEvent {
    let started = Instant::now();
    match reader.execute(provider, plan).await {
        Ok(results) => {
            debug!(id, reads = plan.len(), elapsed_ms = started.elapsed().as_millis() as u64, "batch resolved");
            RuntimeEvent::BatchResolved { id, results }
        }
        Err(err) => {
            warn!(id, error = %format!("{err:#}"), "batch failed");
            RuntimeEvent::BatchFailed {
                id,
                message: format!("{:#}", err),
            }
        }
    }
}

/// ENS lookup for `address`; failures resolve to an empty identity
async fn lookup_identity(
    provider: &dyn EthereumProvider,
    address: String,
    timeout: Duration,
) -> RuntimeEvent {
    let identity = match address.parse::<Address>() {
        Ok(account) => match tokio::time::timeout(timeout, resolve_identity(provider, account)).await {
            Ok(Ok(identity)) => identity,
            Ok(Err(err)) => {
                debug!(%address, error = %format!("{err:#}"), "ENS lookup failed");
                Default::default()
            }
            Err(_) => {
                debug!(%address, "ENS lookup timed out");
                Default::default()
            }
        },
        Err(_) => Default::default(),
    };
    RuntimeEvent::IdentityResolved {
        address,
        name: identity.name,
        avatar: identity.avatar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{plan, validate, ReadResult};
    use crate::infrastructure::ethereum::contracts::{to_alloy_address, MULTICALL3_ADDRESS};
    use crate::infrastructure::ethereum::testing::MockNode;
    use crate::infrastructure::ethereum::BatchStrategy;
    use alloy::primitives::U256;

    fn reader() -> BatchReader {
        BatchReader::new(
            BatchStrategy::Multicall,
            MULTICALL3_ADDRESS.parse().unwrap(),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_execute_batch_reports_id() {
        let token = validate(&format!("0x{}", "a".repeat(40))).unwrap();
        let node = MockNode::new().with_token(to_alloy_address(&token), 1000, 5_000_000);

        let event = execute_batch(&node, &reader(), 7, &plan(&[token])).await;
        match event {
            RuntimeEvent::BatchResolved { id, results } => {
                assert_eq!(id, 7);
                assert_eq!(
                    results,
                    vec![
                        ReadResult::Value(U256::from(1000u64)),
                        ReadResult::Value(U256::from(5_000_000u64)),
                    ]
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_batch_failure() {
        let token = validate(&format!("0x{}", "a".repeat(40))).unwrap();
        let node = MockNode {
            offline: true,
            ..MockNode::new()
        };

        let event = execute_batch(&node, &reader(), 3, &plan(&[token])).await;
        assert!(matches!(event, RuntimeEvent::BatchFailed { id: 3, .. }));
    }

    #[tokio::test]
    async fn test_lookup_identity_without_records() {
        let node = MockNode::new();
        let event = lookup_identity(
            &node,
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string(),
            Duration::from_secs(1),
        )
        .await;
        match event {
            RuntimeEvent::IdentityResolved { name, avatar, .. } => {
                assert!(name.is_none());
                assert!(avatar.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_health_tracks_node_accounts() {
        let account = Address::with_last_byte(7);
        let node = MockNode {
            accounts: vec![account],
            ..MockNode::new()
        };
        let wallet = Some((ConnectorKind::NodeAccounts, account));
        assert!(check_health(&node, wallet.clone()).await.unwrap());

        let emptied = MockNode::new();
        assert!(!check_health(&emptied, wallet).await.unwrap());
        assert!(check_health(&emptied, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_check_health_fails_when_node_is_down() {
        let node = MockNode {
            offline: true,
            ..MockNode::new()
        };
        assert!(check_health(&node, None).await.is_err());
    }
}
