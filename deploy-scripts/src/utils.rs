//! Utilities for the migration scripts.

use alloy::{
    network::Ethereum,
    primitives::{Address, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::{coins_bip39::English, MnemonicBuilder},
    transports::http::reqwest::Url,
};
use std::str::FromStr;
use tracing::info;

use crate::{config::ResolvedNetwork, errors::ScriptError};

/// The provider type used by the scripts
pub type Wallet = DynProvider<Ethereum>;

/// A connected, signing client
#[derive(Clone)]
pub struct Client {
    /// The provider, with the deployer's signer attached
    pub provider: Wallet,
    /// The deployer's address
    pub sender: Address,
    /// The chain id reported by the node
    pub chain_id: u64,
}

/// Derives the deployer's signer from the network's mnemonic, connects to its
/// RPC endpoint and checks that the node serves the configured network.
pub async fn setup_client(network: &ResolvedNetwork) -> Result<Client, ScriptError> {
    let signer = MnemonicBuilder::<English>::default()
        .phrase(network.mnemonic.as_str())
        .index(network.account_index)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?
        .build()
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let sender = signer.address();

    let url = Url::parse(&network.rpc_url)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let provider = DynProvider::new(ProviderBuilder::new().wallet(signer).connect_http(url));

    let network_id = provider
        .get_net_version()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    if !network.network_id.matches(network_id) {
        return Err(ScriptError::NetworkMismatch(format!(
            "`{}` expects network id {}, node reports {}",
            network.name, network.network_id, network_id
        )));
    }

    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;

    info!("Connected to `{}` (chain {}) as {}", network.name, chain_id, sender);

    Ok(Client {
        provider,
        sender,
        chain_id,
    })
}

/// Read an address stored in the given storage slot of `contract`
pub async fn read_address_slot(
    provider: &Wallet,
    contract: Address,
    slot: &str,
) -> Result<Address, ScriptError> {
    let slot =
        U256::from_str(slot).map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
    let value = provider
        .get_storage_at(contract, slot)
        .await
        .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

    Ok(Address::from_word(B256::from(value.to_be_bytes::<32>())))
}

/// Whether any code is deployed at `address`
pub async fn has_code(provider: &Wallet, address: Address) -> Result<bool, ScriptError> {
    let code = provider
        .get_code_at(address)
        .await
        .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

    Ok(!code.is_empty())
}
