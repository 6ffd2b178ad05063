//! Constants used in the migration scripts

/// The default path of the canonical network configuration file
pub const DEFAULT_CONFIG_PATH: &str = "networks.json";

/// The default network to migrate
pub const DEFAULT_NETWORK: &str = "development";

/// The default directory containing compiled contract artifacts
pub const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";

/// The default directory in which per-network deployment manifests are kept
pub const DEFAULT_DEPLOYMENTS_DIR: &str = "deployments";

/// The environment variable holding the deployer's mnemonic
pub const MNEMONIC_ENV_VAR: &str = "MNEMONIC";

/// The environment variable holding the RPC provider API key
pub const API_KEY_ENV_VAR: &str = "API_KEY";

/// The mnemonic Ganache and Anvil derive their prefunded development accounts from.
///
/// Public by construction; only ever used for `host`/`port` networks.
pub const DEFAULT_DEVNET_MNEMONIC: &str =
    "test test test test test test test test test test test junk";

/// The wildcard accepted as a `network_id`, matching any network
pub const ANY_NETWORK_ID: &str = "*";

/// The name of the function used to initialize proxied contracts
pub const DEFAULT_INITIALIZER: &str = "initialize";

/// The artifact name of the OpenZeppelin proxy admin contract
pub const PROXY_ADMIN_CONTRACT: &str = "ProxyAdmin";

/// The artifact name of the OpenZeppelin transparent proxy contract
pub const PROXY_CONTRACT: &str = "TransparentUpgradeableProxy";

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The storage slot containing the implementation address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const PROXY_IMPLEMENTATION_STORAGE_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// The marker solc leaves in bytecode that still needs library linking
pub const UNLINKED_LIBRARY_MARKER: &str = "__";
