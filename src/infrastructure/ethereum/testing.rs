//! In-memory node used by infrastructure tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use alloy_sol_types::{SolCall, SolValue};
use anyhow::Result;

use crate::infrastructure::ethereum::contracts::{IERC20, IMulticall3, MULTICALL3_ADDRESS};
use crate::infrastructure::ethereum::EthereumProvider;

/// Token state served by the mock node; `None` makes that call revert
#[derive(Debug, Clone, Copy, Default)]
pub struct MockToken {
    pub balance: Option<U256>,
    pub total_supply: Option<U256>,
}

#[derive(Debug, Default)]
pub struct MockNode {
    pub accounts: Vec<Address>,
    pub tokens: HashMap<Address, MockToken>,
    pub offline: bool,
    pub has_multicall: bool,
    pub calls: AtomicUsize,
}

impl MockNode {
    pub fn new() -> Self {
        Self {
            has_multicall: true,
            ..Default::default()
        }
    }

    pub fn with_token(mut self, address: Address, balance: u64, total_supply: u64) -> Self {
        self.tokens.insert(
            address,
            MockToken {
                balance: Some(U256::from(balance)),
                total_supply: Some(U256::from(total_supply)),
            },
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, target: Address, data: &[u8]) -> Option<Bytes> {
        let token = self.tokens.get(&target)?;
        let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;
        let value = if selector == IERC20::balanceOfCall::SELECTOR {
            token.balance?
        } else if selector == IERC20::totalSupplyCall::SELECTOR {
            token.total_supply?
        } else {
            return None;
        };
        Some(Bytes::from(value.to_be_bytes::<32>().to_vec()))
    }
}

#[async_trait::async_trait]
impl EthereumProvider for MockNode {
    async fn client_version(&self) -> Result<String> {
        Ok("anvil/v0.3.0".to_string())
    }

    async fn chain_id(&self) -> Result<u64> {
        if self.offline {
            anyhow::bail!("connection refused");
        }
        Ok(31337)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        if self.offline {
            anyhow::bail!("connection refused");
        }
        Ok(self.accounts.clone())
    }

    async fn call(&self, request: TransactionRequest) -> Result<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            anyhow::bail!("connection refused");
        }
        let to = request
            .to
            .and_then(|kind| kind.to().copied())
            .unwrap_or_default();
        let input = request.input.input().cloned().unwrap_or_default();

        let multicall: Address = MULTICALL3_ADDRESS.parse()?;
        if to == multicall {
            if !self.has_multicall {
                return Ok(Bytes::new());
            }
            let decoded = IMulticall3::aggregate3Call::abi_decode(&input)?;
            let results: Vec<IMulticall3::Result> = decoded
                .calls
                .iter()
                .map(|call| match self.answer(call.target, &call.callData) {
                    Some(data) => IMulticall3::Result {
                        success: true,
                        returnData: data,
                    },
                    None => IMulticall3::Result {
                        success: false,
                        returnData: Bytes::new(),
                    },
                })
                .collect();
            return Ok(Bytes::from((results,).abi_encode_params()));
        }

        self.answer(to, &input)
            .ok_or_else(|| anyhow::anyhow!("execution reverted"))
    }

    fn endpoint_name(&self) -> String {
        "mock".to_string()
    }
}
