//! Batched execution of a read plan

use std::time::Duration;

use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use alloy_sol_types::SolCall;
use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Deserialize;
use tracing::debug;

use crate::domain::{ReadRequest, ReadResult};
use crate::infrastructure::ethereum::contracts::{
    decode_read, encode_read, to_alloy_address, IMulticall3,
};
use crate::infrastructure::ethereum::EthereumProvider;

/// How a plan is sent to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStrategy {
    /// One `aggregate3` call through Multicall3
    #[default]
    Multicall,
    /// One `eth_call` per read, issued concurrently
    Individual,
}

/// Executes read plans and returns one result per plan position
#[derive(Debug, Clone)]
pub struct BatchReader {
    pub strategy: BatchStrategy,
    pub multicall: Address,
    pub timeout: Duration,
}

impl BatchReader {
    pub fn new(strategy: BatchStrategy, multicall: Address, timeout: Duration) -> Self {
        Self {
            strategy,
            multicall,
            timeout,
        }
    }

    /// Run `plan`.
    ///
    /// Reads that revert or return malformed data come back as
    /// `ReadResult::Absent`; an `Err` means the batch as a whole failed.
    pub async fn execute(
        &self,
        provider: &dyn EthereumProvider,
        plan: &[ReadRequest],
    ) -> Result<Vec<ReadResult>> {
        if plan.is_empty() {
            return Ok(Vec::new());
        }
        let work = async {
            match self.strategy {
                BatchStrategy::Multicall => self.execute_multicall(provider, plan).await,
                BatchStrategy::Individual => execute_individual(provider, plan).await,
            }
        };
        tokio::time::timeout(self.timeout, work)
            .await
            .with_context(|| format!("Batch read timed out after {:?}", self.timeout))?
    }

    async fn execute_multicall(
        &self,
        provider: &dyn EthereumProvider,
        plan: &[ReadRequest],
    ) -> Result<Vec<ReadResult>> {
        let calls: Vec<IMulticall3::Call3> = plan
            .iter()
            .map(|request| IMulticall3::Call3 {
                target: to_alloy_address(&request.contract),
                allowFailure: true,
                callData: encode_read(request).into(),
            })
            .collect();
        let calldata = IMulticall3::aggregate3Call { calls }.abi_encode();

        let request = TransactionRequest::default()
            .to(self.multicall)
            .input(calldata.into());
        let data = provider
            .call(request)
            .await
            .context("Multicall aggregate3 failed")?;

        let returned = IMulticall3::aggregate3Call::abi_decode_returns(&data)
            .context("Malformed aggregate3 response")?;
        if returned.len() != plan.len() {
            anyhow::bail!(
                "Multicall returned {} results for {} calls",
                returned.len(),
                plan.len()
            );
        }

        debug!(calls = plan.len(), "multicall batch resolved");
        Ok(returned
            .iter()
            .zip(plan)
            .map(|(result, read)| {
                if result.success {
                    decode_read(read.function, &result.returnData)
                } else {
                    ReadResult::Absent
                }
            })
            .collect())
    }
}

/// Every read as its own `eth_call`.
///
/// Failed calls become absent; only a batch where every call failed is
/// reported as an error.
async fn execute_individual(
    provider: &dyn EthereumProvider,
    plan: &[ReadRequest],
) -> Result<Vec<ReadResult>> {
    let calls = plan.iter().map(|read| {
        let request = TransactionRequest::default()
            .to(to_alloy_address(&read.contract))
            .input(encode_read(read).into());
        provider.call(request)
    });
    let outcomes = join_all(calls).await;

    if let Some(Err(first)) = outcomes.first() {
        if outcomes.iter().all(|outcome| outcome.is_err()) {
            anyhow::bail!("All {} reads failed: {:#}", outcomes.len(), first);
        }
    }

    debug!(calls = plan.len(), "individual batch resolved");
    Ok(outcomes
        .into_iter()
        .zip(plan)
        .map(|(outcome, read)| match outcome {
            Ok(data) => decode_read(read.function, &data),
            Err(err) => {
                debug!(%read, error = %err, "read failed");
                ReadResult::Absent
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{plan, validate, TokenAddress};
    use crate::infrastructure::ethereum::contracts::MULTICALL3_ADDRESS;
    use crate::infrastructure::ethereum::testing::MockNode;
    use alloy::primitives::U256;

    fn token(fill: char) -> TokenAddress {
        validate(&format!("0x{}", fill.to_string().repeat(40))).unwrap()
    }

    fn reader(strategy: BatchStrategy) -> BatchReader {
        BatchReader::new(
            strategy,
            MULTICALL3_ADDRESS.parse().unwrap(),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_multicall_results_follow_plan_order() {
        let node = MockNode::new()
            .with_token(to_alloy_address(&token('a')), 1000, 5_000_000)
            .with_token(to_alloy_address(&token('b')), 7, 9);
        let plan = plan(&[token('a'), token('b'), token('c')]);

        let results = reader(BatchStrategy::Multicall)
            .execute(&node, &plan)
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                ReadResult::Value(U256::from(1000u64)),
                ReadResult::Value(U256::from(5_000_000u64)),
                ReadResult::Value(U256::from(7u64)),
                ReadResult::Value(U256::from(9u64)),
                ReadResult::Absent,
                ReadResult::Absent,
            ]
        );
        assert_eq!(node.call_count(), 1);
    }

    #[tokio::test]
    async fn test_individual_calls() {
        let node = MockNode::new().with_token(to_alloy_address(&token('a')), 1000, 5_000_000);
        let plan = plan(&[token('a'), token('c')]);

        let results = reader(BatchStrategy::Individual)
            .execute(&node, &plan)
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results[0], ReadResult::Value(U256::from(1000u64)));
        assert_eq!(results[1], ReadResult::Value(U256::from(5_000_000u64)));
        assert_eq!(results[2], ReadResult::Absent);
        assert_eq!(results[3], ReadResult::Absent);
        assert_eq!(node.call_count(), 4);
    }

    #[tokio::test]
    async fn test_offline_node_fails_batch() {
        let node = MockNode {
            offline: true,
            ..MockNode::new()
        };
        let plan = plan(&[token('a')]);

        assert!(reader(BatchStrategy::Multicall).execute(&node, &plan).await.is_err());
        assert!(reader(BatchStrategy::Individual).execute(&node, &plan).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_multicall_contract_fails_batch() {
        let node = MockNode {
            has_multicall: false,
            ..MockNode::new()
        };
        let plan = plan(&[token('a')]);
        assert!(reader(BatchStrategy::Multicall).execute(&node, &plan).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_plan_skips_node() {
        let node = MockNode::new();
        let results = reader(BatchStrategy::Multicall).execute(&node, &[]).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(node.call_count(), 0);
    }
}
