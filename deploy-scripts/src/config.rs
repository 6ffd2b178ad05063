//! The canonical network configuration.
//!
//! A single JSON file describes every network the suite can be migrated to.
//! Secrets never live in that file: the mnemonic and the provider API key are
//! read from the environment when a network is resolved.

use std::{
    collections::BTreeMap,
    env,
    fmt::{self, Debug, Display},
    fs,
    path::Path,
};

use semver::{Version, VersionReq};
use serde::{de, Deserialize, Deserializer};

use crate::{
    constants::{ANY_NETWORK_ID, DEFAULT_DEVNET_MNEMONIC, MNEMONIC_ENV_VAR},
    errors::ScriptError,
};

/// The contents of the network configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// The configured networks, keyed by name
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Compiler settings the contract artifacts are expected to match
    #[serde(default)]
    pub compilers: CompilersConfig,
}

/// A single network entry
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// Host of a local development node
    #[serde(default)]
    pub host: Option<String>,
    /// Port of a local development node
    #[serde(default)]
    pub port: Option<u16>,
    /// RPC URL of a remote network, may contain `${VAR}` placeholders
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// The network id the node is expected to report
    pub network_id: NetworkId,
    /// Gas limit attached to every transaction
    #[serde(default)]
    pub gas: Option<u64>,
    /// Gas price, in wei, attached to every transaction
    #[serde(default, alias = "gasPrice")]
    pub gas_price: Option<u64>,
    /// Index of the account derived from the mnemonic
    #[serde(default)]
    pub account_index: u32,
}

/// Compiler settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilersConfig {
    /// Solidity compiler settings
    #[serde(default)]
    pub solc: Option<SolcConfig>,
}

/// Solidity compiler settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolcConfig {
    /// The compiler version requirement, e.g. `^0.8.0`
    pub version: String,
}

/// The network id a node must report, or a wildcard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkId {
    /// Any network is accepted
    Any,
    /// Exactly this network id is accepted
    Id(u64),
}

/// A network entry with its endpoint and credentials filled in
#[derive(Clone)]
pub struct ResolvedNetwork {
    /// The network's name in the configuration file
    pub name: String,
    /// The RPC endpoint, with all placeholders substituted
    pub rpc_url: String,
    /// The expected network id
    pub network_id: NetworkId,
    /// Gas limit attached to every transaction
    pub gas: Option<u64>,
    /// Gas price attached to every transaction
    pub gas_price: Option<u64>,
    /// Index of the account derived from the mnemonic
    pub account_index: u32,
    /// The deployer's mnemonic
    pub mnemonic: String,
    /// Whether the network is a development chain that may be reset under
    /// the recorded deployments
    pub dev: bool,
}

// ----------------
// | Loading      |
// ----------------

impl DeployConfig {
    /// Read and validate the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ScriptError::Config(format!("{}: {}", path.display(), e)))?;

        Self::from_json(&contents)
    }

    /// Parse and validate a configuration from its JSON text
    pub fn from_json(contents: &str) -> Result<Self, ScriptError> {
        let config: DeployConfig =
            serde_json::from_str(contents).map_err(|e| ScriptError::Config(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Check that every network entry carries the keys required for its kind,
    /// and that the compiler requirement parses
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.networks.is_empty() {
            return Err(ScriptError::Config("no networks configured".to_string()));
        }

        if let Some(solc) = &self.compilers.solc {
            solc.requirement()?;
        }

        self.networks
            .iter()
            .try_for_each(|(name, network)| network.validate(name))
    }

    /// Look up a network by name
    pub fn network(&self, name: &str) -> Result<&NetworkConfig, ScriptError> {
        self.networks
            .get(name)
            .ok_or_else(|| ScriptError::UnknownNetwork(name.to_string()))
    }

    /// Resolve the named network's endpoint and credentials against `env`
    pub fn resolve<F>(&self, name: &str, env: F) -> Result<ResolvedNetwork, ScriptError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = self.network(name)?;

        let (rpc_url, mnemonic) = match (&network.host, network.port, &network.rpc_url) {
            (Some(host), Some(port), None) => {
                let mnemonic = env(MNEMONIC_ENV_VAR)
                    .unwrap_or_else(|| DEFAULT_DEVNET_MNEMONIC.to_string());
                (format!("http://{host}:{port}"), mnemonic)
            }
            (None, None, Some(template)) => {
                let rpc_url = interpolate_env(template, &env)?;
                let mnemonic = env(MNEMONIC_ENV_VAR)
                    .ok_or_else(|| ScriptError::MissingEnv(MNEMONIC_ENV_VAR.to_string()))?;
                (rpc_url, mnemonic)
            }
            _ => {
                network.validate(name)?;
                return Err(ScriptError::Config(format!("network `{name}` has no endpoint")));
            }
        };

        Ok(ResolvedNetwork {
            name: name.to_string(),
            rpc_url,
            network_id: network.network_id,
            gas: network.gas,
            gas_price: network.gas_price,
            account_index: network.account_index,
            mnemonic,
            dev: network.is_dev(),
        })
    }
}

impl NetworkConfig {
    /// Whether this entry points at a local development node
    pub fn is_local(&self) -> bool {
        self.host.is_some()
    }

    /// Whether this entry is a development chain: a local node, or one that
    /// accepts any network id
    pub fn is_dev(&self) -> bool {
        self.is_local() || self.network_id == NetworkId::Any
    }

    /// Check that exactly one of `host`/`port` or `rpc_url` is given
    fn validate(&self, name: &str) -> Result<(), ScriptError> {
        let err = |msg: &str| Err(ScriptError::Config(format!("network `{name}`: {msg}")));

        match (&self.host, self.port, &self.rpc_url) {
            (Some(_), Some(_), None) | (None, None, Some(_)) => Ok(()),
            (Some(_), None, _) => err("`host` requires `port`"),
            (None, Some(_), _) => err("`port` requires `host`"),
            (Some(_), Some(_), Some(_)) => err("`host`/`port` and `rpc_url` are exclusive"),
            (None, None, None) => err("one of `host`/`port` or `rpc_url` is required"),
        }
    }
}

impl SolcConfig {
    /// The configured version requirement.
    ///
    /// Truffle accepts npm-style ranges with space-separated comparators, e.g.
    /// `>=0.6.0 <0.9.0`; they are rejoined with commas for `semver`
    pub fn requirement(&self) -> Result<VersionReq, ScriptError> {
        let mut comparators: Vec<String> = Vec::new();
        let tokens = self
            .version
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty());

        for token in tokens {
            match comparators.last_mut() {
                // An operator written apart from its version, e.g. `>= 0.6.0`
                Some(last) if last.chars().all(|c| "^~=<>".contains(c)) => last.push_str(token),
                // A bare version pins the compiler in Truffle, where `semver` reads a caret
                _ if token.starts_with(|c: char| c.is_ascii_digit()) => {
                    comparators.push(format!("={token}"))
                }
                _ => comparators.push(token.to_string()),
            }
        }

        VersionReq::parse(&comparators.join(", ")).map_err(|e| {
            ScriptError::Config(format!("invalid solc version `{}`: {}", self.version, e))
        })
    }

    /// Whether an artifact compiled with `compiler_version` satisfies the
    /// configured requirement. Build metadata such as `+commit.c7dfd78e` is
    /// ignored
    pub fn accepts(&self, compiler_version: &str) -> Result<bool, ScriptError> {
        let requirement = self.requirement()?;

        let core = compiler_version
            .trim_start_matches('v')
            .split('+')
            .next()
            .unwrap_or_default();
        let version = Version::parse(core).map_err(|e| {
            ScriptError::ArtifactParsing(format!("compiler version `{compiler_version}`: {e}"))
        })?;

        Ok(requirement.matches(&version))
    }
}

/// Read a variable from the process environment
pub fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Substitute every `${VAR}` in `template` with its value from `env`
pub fn interpolate_env<F>(template: &str, env: &F) -> Result<String, ScriptError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            ScriptError::Config(format!("unterminated placeholder in `{template}`"))
        })?;

        let key = &after[..end];
        let value = env(key).ok_or_else(|| ScriptError::MissingEnv(key.to_string()))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

// ----------------
// | Network ids  |
// ----------------

impl NetworkId {
    /// Whether a node reporting `id` satisfies this requirement
    pub fn matches(&self, id: u64) -> bool {
        match self {
            NetworkId::Any => true,
            NetworkId::Id(expected) => *expected == id,
        }
    }
}

impl Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Any => write!(f, "{}", ANY_NETWORK_ID),
            NetworkId::Id(id) => write!(f, "{}", id),
        }
    }
}

impl<'de> Deserialize<'de> for NetworkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        /// A network id as written in the file
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            /// A numeric id
            Id(u64),
            /// The wildcard, or a numeric id written as a string
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Id(id) => Ok(NetworkId::Id(id)),
            Raw::Str(s) if s == ANY_NETWORK_ID => Ok(NetworkId::Any),
            Raw::Str(s) => s
                .parse()
                .map(NetworkId::Id)
                .map_err(|_| de::Error::custom(format!("invalid network_id `{s}`"))),
        }
    }
}

impl Debug for ResolvedNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedNetwork")
            .field("name", &self.name)
            .field("network_id", &self.network_id)
            .field("gas", &self.gas)
            .field("gas_price", &self.gas_price)
            .field("account_index", &self.account_index)
            .field("dev", &self.dev)
            .finish_non_exhaustive()
    }
}
