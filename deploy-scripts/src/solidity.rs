//! Definitions of Solidity functions called during deployment

use alloy::sol;

sol! {
    /// The OpenZeppelin 4.x `ProxyAdmin` upgrade entrypoints
    #[allow(missing_docs)]
    interface ProxyAdmin {
        function upgrade(address proxy, address implementation) external;
        function upgradeAndCall(address proxy, address implementation, bytes data) external payable;
    }
}
