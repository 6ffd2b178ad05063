//! Deployment of upgradeable proxies.
//!
//! Each proxied contract is deployed as an OpenZeppelin
//! [`TransparentUpgradeableProxy`](https://docs.openzeppelin.com/contracts/4.x/api/proxy#TransparentUpgradeableProxy)
//! pointing at an implementation contract. All proxies on a network share a
//! single `ProxyAdmin`, and upgrade calls can only reach a proxy through it.
//!
//! The initializer is passed as the proxy's constructor data, so it runs
//! exactly once, in the same transaction that creates the proxy.
//!
//! Every artifact a deployment needs is loaded and encoded before its first
//! transaction is sent. Recorded addresses are only reused while code is
//! still deployed at them.

use std::path::{Path, PathBuf};

use alloy::{
    dyn_abi::DynSolValue,
    json_abi::JsonAbi,
    network::TransactionBuilder,
    primitives::{Address, Bytes, B256},
    providers::Provider,
    rpc::types::{TransactionReceipt, TransactionRequest},
    sol_types::SolCall,
};
use tracing::{info, warn};

use crate::{
    artifacts::ContractArtifact,
    calldata::{deploy_code, encode_initializer},
    config::{ResolvedNetwork, SolcConfig},
    constants::{
        PROXY_ADMIN_CONTRACT, PROXY_ADMIN_STORAGE_SLOT, PROXY_CONTRACT,
        PROXY_IMPLEMENTATION_STORAGE_SLOT,
    },
    errors::ScriptError,
    manifest::Manifest,
    migrations::DeploymentRecord,
    solidity::ProxyAdmin,
    utils::{has_code, read_address_slot, Client, Wallet},
};

/// The addresses produced by deploying or upgrading a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedProxy {
    /// The proxy's address
    pub proxy: Address,
    /// The implementation the proxy delegates to
    pub implementation: Address,
    /// The admin allowed to upgrade the proxy
    pub admin: Address,
    /// The keccak256 hash of the implementation's creation bytecode
    pub bytecode_hash: B256,
}

/// A function called on the new implementation as part of an upgrade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeCall {
    /// The function's name
    pub function: String,
    /// The function's arguments, coerced using the contract's ABI
    pub args: Vec<String>,
}

/// The capability the migrations consume: deploying and upgrading proxies.
///
/// Contracts deployed along the way are recorded in `manifest` as soon as
/// they exist, so they survive a failure later in the same call.
#[allow(async_fn_in_trait)]
pub trait ProxyDeployer {
    /// Deploy `record.contract` behind a new proxy, running its initializer once
    async fn deploy_proxy(
        &mut self,
        record: &DeploymentRecord,
        manifest: &mut Manifest,
    ) -> Result<DeployedProxy, ScriptError>;

    /// Point the recorded proxy for `contract` at a freshly built implementation
    async fn upgrade_proxy(
        &mut self,
        contract: &str,
        call: Option<&UpgradeCall>,
        manifest: &mut Manifest,
    ) -> Result<DeployedProxy, ScriptError>;
}

/// A contract that is either already deployed or still to be created
enum Pending {
    /// Deployed at this address
    Deployed(Address),
    /// To be created from this code
    Create(Bytes),
}

/// The data passed to the proxy's constructor for `record`.
///
/// A record without an initializer, the counterpart of truffle-upgrades'
/// `initializer: false`, deploys with empty data and takes no arguments
pub fn initializer_data(record: &DeploymentRecord, abi: &JsonAbi) -> Result<Bytes, ScriptError> {
    match &record.initializer {
        Some(initializer) => encode_initializer(abi, initializer, &record.args),
        None if record.args.is_empty() => Ok(Bytes::new()),
        None => Err(ScriptError::CalldataConstruction(format!(
            "arguments given for `{}` without an initializer",
            record.contract
        ))),
    }
}

/// The creation code of a `TransparentUpgradeableProxy(logic, admin, data)`
pub fn proxy_creation_code(
    proxy_artifact: &ContractArtifact,
    implementation: Address,
    admin: Address,
    init_data: &Bytes,
) -> Result<Bytes, ScriptError> {
    deploy_code(
        proxy_artifact,
        &[
            DynSolValue::Address(implementation),
            DynSolValue::Address(admin),
            DynSolValue::Bytes(init_data.to_vec()),
        ],
    )
}

/// Whether a recorded address can be reused, given whether code was found at
/// it. Development chains get the contract redeployed; elsewhere the manifest
/// no longer describes the chain and the run stops
pub fn reuse_recorded(
    contract: &str,
    address: Address,
    code_found: bool,
    dev: bool,
) -> Result<Option<Address>, ScriptError> {
    match (code_found, dev) {
        (true, _) => Ok(Some(address)),
        (false, true) => {
            warn!("No code at recorded {} {:#x}, redeploying", contract, address);
            Ok(None)
        }
        (false, false) => Err(ScriptError::NetworkMismatch(format!(
            "no code at recorded {contract} {address:#x}"
        ))),
    }
}

/// A [`ProxyDeployer`] submitting transactions to a live network
pub struct ChainDeployer {
    /// The connected client
    client: Client,
    /// The directory holding compiled artifacts
    artifacts_dir: PathBuf,
    /// The compiler version artifacts are expected to come from
    solc: Option<SolcConfig>,
    /// Gas limit attached to every transaction
    gas: Option<u64>,
    /// Gas price attached to every transaction
    gas_price: Option<u64>,
    /// Whether the network is a development chain
    dev: bool,
}

impl ChainDeployer {
    /// Create a deployer for `network` over a connected client
    pub fn new(
        client: Client,
        network: &ResolvedNetwork,
        artifacts_dir: impl AsRef<Path>,
        solc: Option<SolcConfig>,
    ) -> Self {
        Self {
            client,
            artifacts_dir: artifacts_dir.as_ref().to_path_buf(),
            solc,
            gas: network.gas,
            gas_price: network.gas_price,
            dev: network.dev,
        }
    }

    /// The provider transactions are sent through
    fn provider(&self) -> &Wallet {
        &self.client.provider
    }

    /// Load an artifact, warning if it was built by an unexpected compiler
    fn load_artifact(&self, contract: &str) -> Result<ContractArtifact, ScriptError> {
        let artifact = ContractArtifact::load(&self.artifacts_dir, contract)?;

        if let (Some(solc), Some(version)) = (&self.solc, &artifact.compiler_version) {
            if !solc.accepts(version)? {
                warn!(
                    "`{}` was compiled with solc {}, expected {}",
                    contract, version, solc.version
                );
            }
        }

        Ok(artifact)
    }

    /// Send a transaction with the network's gas settings and wait for a
    /// successful receipt, wrapping failures with `err`
    async fn submit(
        &self,
        mut tx: TransactionRequest,
        err: fn(String) -> ScriptError,
    ) -> Result<TransactionReceipt, ScriptError> {
        if let Some(gas) = self.gas {
            tx.set_gas_limit(gas);
        }
        if let Some(gas_price) = self.gas_price {
            tx.set_gas_price(u128::from(gas_price));
        }

        let receipt = self
            .provider()
            .send_transaction(tx)
            .await
            .map_err(|e| err(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| err(e.to_string()))?;

        if !receipt.status() {
            return Err(err(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }

        Ok(receipt)
    }

    /// Deploy a contract from its creation code, returning its address
    async fn deploy(&self, contract: &str, code: Bytes) -> Result<Address, ScriptError> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let receipt = self.submit(tx, ScriptError::ContractDeployment).await?;

        let address = receipt.contract_address.ok_or_else(|| {
            ScriptError::ContractDeployment(format!("no contract address for `{contract}`"))
        })?;
        info!("{} deployed at {:#x}", contract, address);

        Ok(address)
    }

    /// Reuse `recorded` if code is still deployed there, otherwise build the
    /// creation code with `code`
    async fn pending<F>(
        &self,
        contract: &str,
        recorded: Option<Address>,
        code: F,
    ) -> Result<Pending, ScriptError>
    where
        F: FnOnce() -> Result<Bytes, ScriptError>,
    {
        let reusable = match recorded {
            Some(address) => {
                let found = has_code(self.provider(), address).await?;
                reuse_recorded(contract, address, found, self.dev)?
            }
            None => None,
        };

        match reusable {
            Some(address) => {
                info!("Reusing {} at {:#x}", contract, address);
                Ok(Pending::Deployed(address))
            }
            None => code().map(Pending::Create),
        }
    }

    /// The implementation for `artifact`: one with identical bytecode if it is
    /// recorded and still deployed, otherwise its creation code
    async fn pending_implementation(
        &self,
        artifact: &ContractArtifact,
        manifest: &Manifest,
    ) -> Result<Pending, ScriptError> {
        let recorded = manifest.implementation_for(artifact.bytecode_hash());
        self.pending(&artifact.contract_name, recorded, || deploy_code(artifact, &[]))
            .await
    }

    /// Create a pending implementation, recording it in `manifest`
    async fn create_implementation(
        &self,
        artifact: &ContractArtifact,
        pending: Pending,
        manifest: &mut Manifest,
    ) -> Result<Address, ScriptError> {
        match pending {
            Pending::Deployed(address) => Ok(address),
            Pending::Create(code) => {
                let address = self.deploy(&artifact.contract_name, code).await?;
                manifest.record_implementation(
                    &artifact.contract_name,
                    address,
                    artifact.bytecode_hash(),
                );
                Ok(address)
            }
        }
    }

    /// The creation code of the network's `ProxyAdmin`
    fn proxy_admin_code(&self) -> Result<Bytes, ScriptError> {
        let artifact = self.load_artifact(PROXY_ADMIN_CONTRACT)?;
        // OpenZeppelin 5.x takes the initial owner as a constructor argument
        let takes_owner = artifact
            .abi
            .constructor()
            .is_some_and(|c| c.inputs.len() == 1);
        let args = if takes_owner {
            vec![DynSolValue::Address(self.client.sender)]
        } else {
            vec![]
        };

        deploy_code(&artifact, &args)
    }
}

impl ProxyDeployer for ChainDeployer {
    async fn deploy_proxy(
        &mut self,
        record: &DeploymentRecord,
        manifest: &mut Manifest,
    ) -> Result<DeployedProxy, ScriptError> {
        let artifact = self.load_artifact(&record.contract)?;
        let init_data = initializer_data(record, &artifact.abi)?;

        let proxy_artifact = self.load_artifact(PROXY_CONTRACT)?;
        // Only the addresses are unknown until the first transactions land
        proxy_creation_code(&proxy_artifact, Address::ZERO, Address::ZERO, &init_data)?;

        let implementation = self.pending_implementation(&artifact, manifest).await?;
        let admin = self
            .pending(PROXY_ADMIN_CONTRACT, manifest.proxy_admin, || {
                self.proxy_admin_code()
            })
            .await?;

        let implementation = self
            .create_implementation(&artifact, implementation, manifest)
            .await?;
        let admin = match admin {
            Pending::Deployed(admin) => admin,
            Pending::Create(code) => {
                let admin = self.deploy(PROXY_ADMIN_CONTRACT, code).await?;
                manifest.record_admin(admin);
                admin
            }
        };

        let code = proxy_creation_code(&proxy_artifact, implementation, admin, &init_data)?;
        let proxy = self.deploy(PROXY_CONTRACT, code).await?;

        // Read the admin back from the proxy rather than trusting the argument
        let admin = read_address_slot(self.provider(), proxy, PROXY_ADMIN_STORAGE_SLOT).await?;

        Ok(DeployedProxy {
            proxy,
            implementation,
            admin,
            bytecode_hash: artifact.bytecode_hash(),
        })
    }

    async fn upgrade_proxy(
        &mut self,
        contract: &str,
        call: Option<&UpgradeCall>,
        manifest: &mut Manifest,
    ) -> Result<DeployedProxy, ScriptError> {
        let current = *manifest.proxy(contract)?;
        let admin = manifest.proxy_admin.ok_or_else(|| {
            ScriptError::ReadManifest(format!("no proxy admin on `{}`", manifest.network))
        })?;
        for (name, address) in [(contract, current.proxy), (PROXY_ADMIN_CONTRACT, admin)] {
            if !has_code(self.provider(), address).await? {
                return Err(ScriptError::NetworkMismatch(format!(
                    "no code at recorded {name} {address:#x}, migrate with `--reset` first"
                )));
            }
        }

        let artifact = self.load_artifact(contract)?;
        let data = call
            .map(|c| encode_initializer(&artifact.abi, &c.function, &c.args))
            .transpose()?;

        let pending = self.pending_implementation(&artifact, manifest).await?;
        let implementation = self
            .create_implementation(&artifact, pending, manifest)
            .await?;
        if implementation == current.implementation && data.is_none() {
            info!("{} is already up to date", contract);
            return Ok(DeployedProxy {
                proxy: current.proxy,
                implementation,
                admin,
                bytecode_hash: current.bytecode_hash,
            });
        }

        let input: Bytes = match data {
            Some(data) => ProxyAdmin::upgradeAndCallCall {
                proxy: current.proxy,
                implementation,
                data,
            }
            .abi_encode()
            .into(),
            None => ProxyAdmin::upgradeCall {
                proxy: current.proxy,
                implementation,
            }
            .abi_encode()
            .into(),
        };

        let tx = TransactionRequest::default()
            .with_to(admin)
            .with_input(input);
        self.submit(tx, ScriptError::ContractInteraction).await?;

        let active =
            read_address_slot(self.provider(), current.proxy, PROXY_IMPLEMENTATION_STORAGE_SLOT)
                .await?;
        if active != implementation {
            return Err(ScriptError::ContractInteraction(format!(
                "proxy {:#x} still points at {:#x}",
                current.proxy, active
            )));
        }

        info!("{} upgraded to {:#x}", contract, implementation);

        Ok(DeployedProxy {
            proxy: current.proxy,
            implementation,
            admin,
            bytecode_hash: artifact.bytecode_hash(),
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy::{dyn_abi::DynSolType, sol};

    use super::*;

    sol! {
        function initialize(address admin) external;
    }

    /// An OpenZeppelin 4.x `TransparentUpgradeableProxy` artifact
    const PROXY_ARTIFACT: &str = r#"{
        "contractName": "TransparentUpgradeableProxy",
        "abi": [
            {
                "inputs": [
                    {"internalType": "address", "name": "_logic", "type": "address"},
                    {"internalType": "address", "name": "admin_", "type": "address"},
                    {"internalType": "bytes", "name": "_data", "type": "bytes"}
                ],
                "stateMutability": "payable",
                "type": "constructor"
            }
        ],
        "bytecode": "0x608060405260405162000f3838038062000f38"
    }"#;

    /// An implementation with an `initialize(address)` initializer
    const BOX_ABI: &str = r#"[
        {
            "inputs": [{"internalType": "address", "name": "admin", "type": "address"}],
            "name": "initialize",
            "outputs": [],
            "stateMutability": "nonpayable",
            "type": "function"
        }
    ]"#;

    /// A deployment record for `MyContract`
    fn record(initializer: Option<&str>, args: &[&str]) -> DeploymentRecord {
        DeploymentRecord {
            contract: "MyContract".to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            initializer: initializer.map(str::to_string),
        }
    }

    #[test]
    fn test_proxy_creation_code() {
        let proxy = ContractArtifact::from_json(PROXY_CONTRACT, PROXY_ARTIFACT).unwrap();
        let abi: JsonAbi = serde_json::from_str(BOX_ABI).unwrap();

        let owner = Address::with_last_byte(0x42);
        let implementation = Address::with_last_byte(0x10);
        let admin = Address::with_last_byte(0xff);
        let owner_arg = owner.to_string();
        let init_data =
            initializer_data(&record(Some("initialize"), &[owner_arg.as_str()]), &abi).unwrap();

        let code = proxy_creation_code(&proxy, implementation, admin, &init_data).unwrap();
        assert!(code.starts_with(&proxy.bytecode[..]));

        let tail = &code[proxy.bytecode.len()..];
        let params = DynSolType::Tuple(vec![
            DynSolType::Address,
            DynSolType::Address,
            DynSolType::Bytes,
        ]);
        let decoded = params.abi_decode_params(tail).unwrap();

        let initialize = initializeCall { admin: owner }.abi_encode();
        assert_eq!(
            decoded,
            DynSolValue::Tuple(vec![
                DynSolValue::Address(implementation),
                DynSolValue::Address(admin),
                DynSolValue::Bytes(initialize),
            ])
        );
    }

    #[test]
    fn test_proxy_artifact_without_constructor() {
        let proxy = ContractArtifact::from_json(
            PROXY_CONTRACT,
            r#"{"abi": [], "bytecode": "0x6080604052"}"#,
        )
        .unwrap();

        let res = proxy_creation_code(&proxy, Address::ZERO, Address::ZERO, &Bytes::new());
        assert!(matches!(res, Err(ScriptError::CalldataConstruction(_))));
    }

    #[test]
    fn test_initializer_data() {
        let abi: JsonAbi = serde_json::from_str(BOX_ABI).unwrap();

        // Deployed without an initializer, the proxy gets no constructor data
        assert!(initializer_data(&record(None, &[]), &abi).unwrap().is_empty());
        assert!(matches!(
            initializer_data(&record(None, &["0x01"]), &abi),
            Err(ScriptError::CalldataConstruction(msg)) if msg.contains("MyContract")
        ));

        let data = initializer_data(
            &record(Some("initialize"), &["0x8dD9c91E7e4CE76FB7d0aBb53e363812abD567f7"]),
            &abi,
        )
        .unwrap();
        assert_eq!(data[..4], initializeCall::SELECTOR);
    }

    #[test]
    fn test_reuse_recorded() {
        let recorded = Address::with_last_byte(7);

        assert_eq!(reuse_recorded("UKHToken", recorded, true, false).unwrap(), Some(recorded));
        assert_eq!(reuse_recorded("UKHToken", recorded, true, true).unwrap(), Some(recorded));

        // A restarted development chain lost the contract: deploy it again
        assert_eq!(reuse_recorded("UKHToken", recorded, false, true).unwrap(), None);
        assert!(matches!(
            reuse_recorded("ProxyAdmin", recorded, false, false),
            Err(ScriptError::NetworkMismatch(msg)) if msg.contains("ProxyAdmin")
        ));
    }
}
