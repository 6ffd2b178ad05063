//! Proxy deployments against a running Anvil node.
//!
//! These tests need `anvil` listening on the `development` network's endpoint
//! and compiled artifacts for `UKHToken`, `ProxyAdmin` and
//! `TransparentUpgradeableProxy` under `build/contracts`, or under
//! `$ARTIFACTS_DIR` if set:
//!
//! `cargo test -p ukh-deploy-scripts --test devnet -- --ignored`

use std::{env, path::PathBuf};

use alloy::{primitives::Bytes, providers::ext::AnvilApi};
use deploy_scripts::{
    config::{DeployConfig, ResolvedNetwork},
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_CONFIG_PATH, DEFAULT_NETWORK, PROXY_ADMIN_STORAGE_SLOT,
        PROXY_IMPLEMENTATION_STORAGE_SLOT,
    },
    deployer::{ChainDeployer, ProxyDeployer},
    errors::ScriptError,
    manifest::Manifest,
    migrations::{migrations, DeploymentRecord},
    utils::{has_code, read_address_slot, setup_client, Client},
};

/// The workspace root, where the network configuration lives
fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

/// Connect to the development network with its default devnet account
async fn connect() -> (DeployConfig, ResolvedNetwork, Client) {
    let config = DeployConfig::load(workspace_root().join(DEFAULT_CONFIG_PATH)).unwrap();
    let network = config.resolve(DEFAULT_NETWORK, |_| None).unwrap();
    let client = setup_client(&network).await.unwrap();

    (config, network, client)
}

/// A deployer reading artifacts from `$ARTIFACTS_DIR` or the default directory
fn deployer(config: &DeployConfig, network: &ResolvedNetwork, client: &Client) -> ChainDeployer {
    let artifacts = env::var("ARTIFACTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| workspace_root().join(DEFAULT_ARTIFACTS_DIR));

    ChainDeployer::new(
        client.clone(),
        network,
        artifacts,
        config.compilers.solc.clone(),
    )
}

/// The token migration's deployment
fn token_record() -> DeploymentRecord {
    migrations()
        .into_iter()
        .find(|m| m.record.contract == "UKHToken")
        .unwrap()
        .record
}

#[tokio::test]
#[ignore = "requires a running anvil node and compiled artifacts"]
async fn test_deploy_and_reuse() {
    let (config, network, client) = connect().await;
    let mut deployer = deployer(&config, &network, &client);
    let mut manifest = Manifest::new(DEFAULT_NETWORK);
    manifest.check_chain(client.chain_id).unwrap();

    let record = token_record();
    let first = deployer.deploy_proxy(&record, &mut manifest).await.unwrap();
    manifest.record_proxy(&record.contract, &first);

    let provider = &client.provider;
    assert!(has_code(provider, first.proxy).await.unwrap());
    assert_eq!(
        read_address_slot(provider, first.proxy, PROXY_IMPLEMENTATION_STORAGE_SLOT)
            .await
            .unwrap(),
        first.implementation
    );
    assert_eq!(
        read_address_slot(provider, first.proxy, PROXY_ADMIN_STORAGE_SLOT)
            .await
            .unwrap(),
        first.admin
    );

    // A second proxy shares the implementation and the admin
    let second = deployer.deploy_proxy(&record, &mut manifest).await.unwrap();
    assert_ne!(second.proxy, first.proxy);
    assert_eq!(second.implementation, first.implementation);
    assert_eq!(second.admin, first.admin);

    // Nothing changed, so the upgrade sends no transaction
    let upgraded = deployer
        .upgrade_proxy(&record.contract, None, &mut manifest)
        .await
        .unwrap();
    assert_eq!(upgraded.implementation, first.implementation);
}

#[tokio::test]
#[ignore = "requires a running anvil node and compiled artifacts"]
async fn test_redeploys_after_devnet_reset() {
    let (config, network, client) = connect().await;
    let mut manifest = Manifest::new(DEFAULT_NETWORK);
    manifest.check_chain(client.chain_id).unwrap();

    let record = token_record();
    let first = deployer(&config, &network, &client)
        .deploy_proxy(&record, &mut manifest)
        .await
        .unwrap();
    manifest.record_proxy(&record.contract, &first);

    // Wipe the recorded contracts, as restarting the node under the same chain id would
    let provider = &client.provider;
    for address in [first.implementation, first.admin] {
        provider.anvil_set_code(address, Bytes::new()).await.unwrap();
    }

    // A remote network refuses to build on the missing contracts
    let remote = ResolvedNetwork {
        dev: false,
        ..network.clone()
    };
    let res = deployer(&config, &remote, &client)
        .deploy_proxy(&record, &mut manifest)
        .await;
    assert!(matches!(res, Err(ScriptError::NetworkMismatch(_))));

    // A development network deploys them again
    let redeployed = deployer(&config, &network, &client)
        .deploy_proxy(&record, &mut manifest)
        .await
        .unwrap();
    assert_ne!(redeployed.implementation, first.implementation);
    assert_ne!(redeployed.admin, first.admin);
    assert!(has_code(provider, redeployed.implementation).await.unwrap());
    assert_eq!(manifest.proxy_admin, Some(redeployed.admin));
    assert_eq!(
        manifest.implementation_for(redeployed.bytecode_hash),
        Some(redeployed.implementation)
    );
}
