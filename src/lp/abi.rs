//! Contract interfaces used for LP introspection

use alloy_primitives::{address, Address};
use alloy_sol_types::sol;

/// Multicall3 (same address on every supported chain)
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Constituent indices probed during classification. Exactly indices 0 and 1
/// must resolve; index 2 resolving means a 3+ coin pool, which is out of scope.
pub const PROBED_COIN_INDICES: [u8; 3] = [0, 1, 2];

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    /// Curve-style pool whose LP token is the pool contract itself
    #[allow(missing_docs)]
    interface ICurvePool {
        /// Get coin address at index (reverts past the last coin)
        function coins(uint256 i) external view returns (address);

        /// Get pool balance for coin at index
        function balances(uint256 i) external view returns (uint256);
    }
}

sol! {
    #[allow(missing_docs)]
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

        function aggregate3(Call3[] calldata calls)
            external payable returns (Result[] memory returnData);
    }
}

sol! {
    #[allow(missing_docs)]
    interface IERC20 {
        function totalSupply() external view returns (uint256);
        function decimals() external view returns (uint8);
    }
}
