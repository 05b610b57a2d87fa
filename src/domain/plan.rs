//! Balance query planning
//!
//! A plan is inert data: two reads per watched address, in list order,
//! `balanceOf` before `totalSupply`. Executing it is the job of the
//! batched-read collaborator, which must answer with one result per plan
//! position.

use std::fmt;
use std::time::Instant;

use alloy_primitives::U256;

use super::address::TokenAddress;

/// ERC-20 read function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadFunction {
    BalanceOf,
    TotalSupply,
}

impl ReadFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ReadFunction::BalanceOf => "balanceOf",
            ReadFunction::TotalSupply => "totalSupply",
        }
    }
}

/// One contract read.
///
/// For `balanceOf` the queried account is the contract address itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadRequest {
    pub contract: TokenAddress,
    pub function: ReadFunction,
}

impl ReadRequest {
    pub fn balance_of(contract: TokenAddress) -> Self {
        Self {
            contract,
            function: ReadFunction::BalanceOf,
        }
    }

    pub fn total_supply(contract: TokenAddress) -> Self {
        Self {
            contract,
            function: ReadFunction::TotalSupply,
        }
    }

    /// Argument passed to the call, if any
    pub fn argument(&self) -> Option<&TokenAddress> {
        match self.function {
            ReadFunction::BalanceOf => Some(&self.contract),
            ReadFunction::TotalSupply => None,
        }
    }
}

impl fmt::Display for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument() {
            Some(arg) => write!(f, "{}.{}({})", self.contract, self.function.name(), arg),
            None => write!(f, "{}.{}()", self.contract, self.function.name()),
        }
    }
}

/// Outcome of one read at a plan position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadResult {
    Value(U256),
    Absent,
}

impl ReadResult {
    pub fn value(&self) -> Option<U256> {
        match self {
            ReadResult::Value(value) => Some(*value),
            ReadResult::Absent => None,
        }
    }

    /// Raw integer string, or `N/A` when absent
    pub fn display(&self) -> String {
        match self {
            ReadResult::Value(value) => value.to_string(),
            ReadResult::Absent => "N/A".to_string(),
        }
    }
}

impl From<Option<U256>> for ReadResult {
    fn from(value: Option<U256>) -> Self {
        value.map(ReadResult::Value).unwrap_or(ReadResult::Absent)
    }
}

/// Derive the read plan for `list`.
///
/// Position `2i` is `balanceOf(list[i])`, position `2i + 1` is
/// `totalSupply(list[i])`.
pub fn plan(list: &[TokenAddress]) -> Vec<ReadRequest> {
    list.iter()
        .flat_map(|address| {
            [
                ReadRequest::balance_of(address.clone()),
                ReadRequest::total_supply(address.clone()),
            ]
        })
        .collect()
}

/// Results of one resolved poll, kept together with the plan it answered.
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    plan: Vec<ReadRequest>,
    results: Vec<ReadResult>,
    pub resolved_at: Instant,
}

impl BatchSnapshot {
    /// Pair a plan with its results. Missing trailing results are padded
    /// with `Absent` and extra ones are dropped so positions always line up.
    pub fn new(plan: Vec<ReadRequest>, mut results: Vec<ReadResult>) -> Self {
        results.resize(plan.len(), ReadResult::Absent);
        Self {
            plan,
            results,
            resolved_at: Instant::now(),
        }
    }

    pub fn plan(&self) -> &[ReadRequest] {
        &self.plan
    }

    pub fn results(&self) -> &[ReadResult] {
        &self.results
    }

    /// Whether this snapshot answered exactly `plan`
    pub fn covers(&self, plan: &[ReadRequest]) -> bool {
        self.plan == plan
    }

    /// Result for `request`, looked up through this snapshot's own plan
    pub fn lookup(&self, request: &ReadRequest) -> Option<ReadResult> {
        self.plan
            .iter()
            .position(|candidate| candidate == request)
            .and_then(|idx| self.results.get(idx).copied())
    }
}

/// Values shown on one card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardValues {
    pub balance: ReadResult,
    pub total_supply: ReadResult,
}

impl CardValues {
    pub const ABSENT: CardValues = CardValues {
        balance: ReadResult::Absent,
        total_supply: ReadResult::Absent,
    };

    /// Card values for `address` from `snapshot`, absent when not covered
    pub fn from_snapshot(snapshot: Option<&BatchSnapshot>, address: &TokenAddress) -> Self {
        let Some(snapshot) = snapshot else {
            return Self::ABSENT;
        };
        Self {
            balance: snapshot
                .lookup(&ReadRequest::balance_of(address.clone()))
                .unwrap_or(ReadResult::Absent),
            total_supply: snapshot
                .lookup(&ReadRequest::total_supply(address.clone()))
                .unwrap_or(ReadResult::Absent),
        }
    }
}
