//! The per-network deployments manifest.
//!
//! Records the proxy admin, every deployed proxy with its current
//! implementation, and the number of the last migration that completed.
//! Implementations and the admin are recorded as soon as they are deployed,
//! so a run that fails before its proxy exists does not deploy them again.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{deployer::DeployedProxy, errors::ScriptError};

/// The deployments recorded for one network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// The network's name in the configuration file
    pub network: String,
    /// The chain the deployments live on, set on first connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// The proxy admin shared by every proxy on this network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_admin: Option<Address>,
    /// The number of the last migration that ran to completion
    #[serde(default)]
    pub last_completed_migration: u32,
    /// The deployed proxies, keyed by contract name
    #[serde(default)]
    pub proxies: BTreeMap<String, ProxyRecord>,
    /// Every implementation deployed on this network, including ones no proxy
    /// points at yet
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implementations: Vec<ImplementationRecord>,
}

/// A deployed implementation contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationRecord {
    /// The contract's artifact name
    pub contract: String,
    /// The implementation's address
    pub address: Address,
    /// The keccak256 hash of its creation bytecode
    pub bytecode_hash: B256,
}

/// A deployed proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRecord {
    /// The proxy's address, the one users interact with
    pub proxy: Address,
    /// The implementation the proxy currently delegates to
    pub implementation: Address,
    /// The keccak256 hash of the implementation's creation bytecode
    pub bytecode_hash: B256,
}

/// The path of the manifest for `network` inside `deployments_dir`
pub fn manifest_path(deployments_dir: impl AsRef<Path>, network: &str) -> PathBuf {
    deployments_dir.as_ref().join(format!("{network}.json"))
}

impl Manifest {
    /// An empty manifest for `network`
    pub fn new(network: &str) -> Self {
        Self {
            network: network.to_string(),
            ..Default::default()
        }
    }

    /// Load the manifest for `network`, or an empty one if none was written yet
    pub fn load(deployments_dir: impl AsRef<Path>, network: &str) -> Result<Self, ScriptError> {
        let path = manifest_path(deployments_dir, network);
        if !path.exists() {
            return Ok(Self::new(network));
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ReadManifest(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| ScriptError::ReadManifest(format!("{}: {}", path.display(), e)))
    }

    /// Write the manifest into `deployments_dir`, creating the directory if needed
    pub fn save(&self, deployments_dir: impl AsRef<Path>) -> Result<(), ScriptError> {
        let deployments_dir = deployments_dir.as_ref();
        fs::create_dir_all(deployments_dir)
            .map_err(|e| ScriptError::WriteManifest(e.to_string()))?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ScriptError::WriteManifest(e.to_string()))?;
        fs::write(manifest_path(deployments_dir, &self.network), contents)
            .map_err(|e| ScriptError::WriteManifest(e.to_string()))
    }

    /// Bind the manifest to `chain_id`, failing if it records another chain
    pub fn check_chain(&mut self, chain_id: u64) -> Result<(), ScriptError> {
        match self.chain_id {
            Some(recorded) if recorded != chain_id => Err(ScriptError::NetworkMismatch(format!(
                "deployments for `{}` were made on chain {recorded}, connected to chain {chain_id}",
                self.network
            ))),
            _ => {
                self.chain_id = Some(chain_id);
                Ok(())
            }
        }
    }

    /// The recorded proxy for `contract`
    pub fn proxy(&self, contract: &str) -> Result<&ProxyRecord, ScriptError> {
        self.proxies.get(contract).ok_or_else(|| {
            ScriptError::ReadManifest(format!(
                "no proxy for `{contract}` on network `{}`",
                self.network
            ))
        })
    }

    /// An already-deployed implementation with the given bytecode hash
    pub fn implementation_for(&self, bytecode_hash: B256) -> Option<Address> {
        let recorded = self
            .implementations
            .iter()
            .find(|record| record.bytecode_hash == bytecode_hash)
            .map(|record| record.address);

        recorded.or_else(|| {
            self.proxies
                .values()
                .find(|record| record.bytecode_hash == bytecode_hash)
                .map(|record| record.implementation)
        })
    }

    /// Record an implementation of `contract`, replacing any earlier one with
    /// the same bytecode
    pub fn record_implementation(&mut self, contract: &str, address: Address, bytecode_hash: B256) {
        self.implementations
            .retain(|record| record.bytecode_hash != bytecode_hash);
        self.implementations.push(ImplementationRecord {
            contract: contract.to_string(),
            address,
            bytecode_hash,
        });
    }

    /// Record the network's proxy admin
    pub fn record_admin(&mut self, admin: Address) {
        self.proxy_admin = Some(admin);
    }

    /// Record a deployed or upgraded proxy for `contract`
    pub fn record_proxy(&mut self, contract: &str, deployed: &DeployedProxy) {
        self.record_admin(deployed.admin);
        if self.implementation_for(deployed.bytecode_hash) != Some(deployed.implementation) {
            self.record_implementation(contract, deployed.implementation, deployed.bytecode_hash);
        }

        self.proxies.insert(
            contract.to_string(),
            ProxyRecord {
                proxy: deployed.proxy,
                implementation: deployed.implementation,
                bytecode_hash: deployed.bytecode_hash,
            },
        );
    }
}
