//! Definitions of errors that can occur during the execution of the migration scripts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Errors that can occur during the execution of the migration scripts
#[derive(Debug)]
pub enum ScriptError {
    /// Error reading or parsing the network configuration file
    Config(String),
    /// A required environment variable is not set
    MissingEnv(String),
    /// The requested network is not present in the configuration
    UnknownNetwork(String),
    /// The connected node reports a different network than the one configured
    NetworkMismatch(String),
    /// Error reading the deployments manifest
    ReadManifest(String),
    /// Error writing the deployments manifest
    WriteManifest(String),
    /// Error reading or parsing a contract build artifact
    ArtifactParsing(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error constructing calldata for a contract method
    CalldataConstruction(String),
    /// Error deploying a contract
    ContractDeployment(String),
    /// Error calling a contract method
    ContractInteraction(String),
}

impl Display for ScriptError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Config(s) => write!(f, "error loading network config: {}", s),
            ScriptError::MissingEnv(s) => write!(f, "environment variable `{}` is not set", s),
            ScriptError::UnknownNetwork(s) => write!(f, "unknown network: {}", s),
            ScriptError::NetworkMismatch(s) => write!(f, "network mismatch: {}", s),
            ScriptError::ReadManifest(s) => write!(f, "error reading deployments: {}", s),
            ScriptError::WriteManifest(s) => write!(f, "error writing deployments: {}", s),
            ScriptError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            ScriptError::ClientInitialization(s) => write!(f, "error initializing client: {}", s),
            ScriptError::CalldataConstruction(s) => write!(f, "error constructing calldata: {}", s),
            ScriptError::ContractDeployment(s) => write!(f, "error deploying contract: {}", s),
            ScriptError::ContractInteraction(s) => {
                write!(f, "error interacting with contract: {}", s)
            }
        }
    }
}

impl Error for ScriptError {}
