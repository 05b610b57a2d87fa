//! Solidity bindings and calldata helpers

use alloy::primitives::Address;
use alloy_sol_types::{sol, SolCall};

use crate::domain::{ReadFunction, ReadRequest, ReadResult, TokenAddress};

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }

    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }

    interface IEnsRegistry {
        function resolver(bytes32 node) external view returns (address);
    }

    interface IEnsResolver {
        function addr(bytes32 node) external view returns (address);
        function name(bytes32 node) external view returns (string memory);
        function text(bytes32 node, string calldata key) external view returns (string memory);
    }
}

/// Canonical Multicall3 deployment, same address on every chain that has one
pub const MULTICALL3_ADDRESS: &str = "0xcA11bde05977b3631167028862bE2a173976CA11";

pub fn to_alloy_address(address: &TokenAddress) -> Address {
    address.address()
}

/// Calldata for one planned read
pub fn encode_read(request: &ReadRequest) -> Vec<u8> {
    match request.function {
        ReadFunction::BalanceOf => IERC20::balanceOfCall {
            account: to_alloy_address(&request.contract),
        }
        .abi_encode(),
        ReadFunction::TotalSupply => IERC20::totalSupplyCall {}.abi_encode(),
    }
}

/// Decode the return data of a planned read; undecodable data is absent
pub fn decode_read(function: ReadFunction, data: &[u8]) -> ReadResult {
    let decoded = match function {
        ReadFunction::BalanceOf => IERC20::balanceOfCall::abi_decode_returns(data),
        ReadFunction::TotalSupply => IERC20::totalSupplyCall::abi_decode_returns(data),
    };
    decoded.map_or(ReadResult::Absent, ReadResult::Value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validate;

    #[test]
    fn test_read_selectors() {
        let token = validate("0x1111111111111111111111111111111111111111").unwrap();

        let balance = encode_read(&ReadRequest::balance_of(token.clone()));
        assert_eq!(&balance[..4], &[0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(balance.len(), 4 + 32);
        assert_eq!(&balance[4..16], &[0u8; 12]);
        assert_eq!(&balance[16..], &[0x11u8; 20]);

        let supply = encode_read(&ReadRequest::total_supply(token));
        assert_eq!(supply, vec![0x18, 0x16, 0x0d, 0xdd]);
    }

    #[test]
    fn test_decode_read() {
        use alloy::primitives::U256;

        let mut word = [0u8; 32];
        word[30] = 0x03;
        word[31] = 0xe8;
        assert_eq!(
            decode_read(ReadFunction::BalanceOf, &word),
            ReadResult::Value(U256::from(1000u64))
        );
        assert_eq!(
            decode_read(ReadFunction::TotalSupply, &word),
            ReadResult::Value(U256::from(1000u64))
        );
        assert_eq!(decode_read(ReadFunction::TotalSupply, &[]), ReadResult::Absent);
        assert_eq!(decode_read(ReadFunction::BalanceOf, &[1, 2, 3]), ReadResult::Absent);
    }

    #[test]
    fn test_multicall_address_parses() {
        let parsed: Address = MULTICALL3_ADDRESS.parse().unwrap();
        assert_eq!(parsed.to_checksum(None), MULTICALL3_ADDRESS);
    }
}
