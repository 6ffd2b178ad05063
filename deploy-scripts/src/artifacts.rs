//! Reading compiled contract artifacts from the build directory

use std::{fs, path::Path};

use alloy::{
    json_abi::JsonAbi,
    primitives::{hex, keccak256, Bytes, B256},
};
use serde::Deserialize;

use crate::{constants::UNLINKED_LIBRARY_MARKER, errors::ScriptError};

/// A compiled contract: its ABI and creation bytecode
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    /// The name of the contract
    pub contract_name: String,
    /// The contract's ABI
    pub abi: JsonAbi,
    /// The contract's creation bytecode
    pub bytecode: Bytes,
    /// The version of the compiler that produced the artifact, if recorded
    pub compiler_version: Option<String>,
}

/// The subset of a Truffle / Hardhat artifact the scripts read
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    /// The contract's name, absent in some build outputs
    #[serde(default)]
    contract_name: Option<String>,
    /// The contract's ABI
    abi: JsonAbi,
    /// The hex-encoded creation bytecode
    #[serde(default)]
    bytecode: Option<String>,
    /// The compiler that produced the artifact
    #[serde(default)]
    compiler: Option<RawCompiler>,
}

/// Compiler information recorded in an artifact
#[derive(Deserialize)]
struct RawCompiler {
    /// The full compiler version, e.g. `0.8.0+commit.c7dfd78e`
    version: String,
}

impl ContractArtifact {
    /// Load the artifact for `contract_name` from `<artifacts_dir>/<contract_name>.json`
    pub fn load(artifacts_dir: impl AsRef<Path>, contract_name: &str) -> Result<Self, ScriptError> {
        let path = artifacts_dir.as_ref().join(format!("{contract_name}.json"));
        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {}", path.display(), e)))?;

        Self::from_json(contract_name, &contents)
    }

    /// Parse an artifact from its JSON text
    pub fn from_json(contract_name: &str, contents: &str) -> Result<Self, ScriptError> {
        let raw: RawArtifact = serde_json::from_str(contents)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{contract_name}: {e}")))?;

        let bytecode = raw.bytecode.unwrap_or_default();
        if bytecode.contains(UNLINKED_LIBRARY_MARKER) {
            return Err(ScriptError::ArtifactParsing(format!(
                "{contract_name}: bytecode has unlinked libraries"
            )));
        }

        let bytecode = Bytes::from(
            hex::decode(&bytecode)
                .map_err(|e| ScriptError::ArtifactParsing(format!("{contract_name}: {e}")))?,
        );
        if bytecode.is_empty() {
            // Interfaces and abstract contracts compile to empty bytecode
            return Err(ScriptError::ArtifactParsing(format!(
                "{contract_name}: artifact has no bytecode"
            )));
        }

        Ok(Self {
            contract_name: raw.contract_name.unwrap_or_else(|| contract_name.to_string()),
            abi: raw.abi,
            bytecode,
            compiler_version: raw.compiler.map(|c| c.version),
        })
    }

    /// The keccak256 hash of the creation bytecode
    pub fn bytecode_hash(&self) -> B256 {
        keccak256(&self.bytecode)
    }
}
