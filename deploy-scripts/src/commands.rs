//! Implementations of the various migration commands

use tracing::{info, warn};

use crate::{
    cli::{GlobalArgs, MigrateArgs, UpgradeArgs},
    config::{process_env, DeployConfig},
    deployer::{ChainDeployer, ProxyDeployer, UpgradeCall},
    errors::ScriptError,
    manifest::Manifest,
    migrations::{migrations, run_migrations, MigrationRange},
    utils::setup_client,
};

/// Connect to the selected network and build a deployer for it, along with
/// the network's manifest bound to the connected chain
async fn connect(global: &GlobalArgs) -> Result<(ChainDeployer, Manifest), ScriptError> {
    let config = DeployConfig::load(&global.config)?;
    let network = config.resolve(&global.network, process_env)?;
    let client = setup_client(&network).await?;

    let mut manifest = Manifest::load(&global.deployments, &network.name)?;
    manifest.check_chain(client.chain_id)?;

    let deployer = ChainDeployer::new(
        client,
        &network,
        &global.artifacts,
        config.compilers.solc.clone(),
    );

    Ok((deployer, manifest))
}

/// Run the selected migrations against the network
pub async fn migrate(args: MigrateArgs, global: &GlobalArgs) -> Result<(), ScriptError> {
    let (mut deployer, mut manifest) = connect(global).await?;

    let ran = run_migrations(
        &mut deployer,
        &mut manifest,
        &migrations(),
        &MigrationRange::from(&args),
        |m| m.save(&global.deployments),
    )
    .await?;

    info!(
        "Ran {} migration(s) on `{}`, last completed: {}",
        ran.len(),
        manifest.network,
        manifest.last_completed_migration
    );

    Ok(())
}

/// Upgrade a proxy and record its new implementation
pub async fn upgrade(args: UpgradeArgs, global: &GlobalArgs) -> Result<(), ScriptError> {
    let (mut deployer, mut manifest) = connect(global).await?;

    let call = args.call.map(|function| UpgradeCall {
        function,
        args: args.args,
    });
    let upgraded = match deployer
        .upgrade_proxy(&args.contract, call.as_ref(), &mut manifest)
        .await
    {
        Ok(upgraded) => upgraded,
        Err(e) => {
            // Keep an implementation deployed before the failure
            if let Err(save_err) = manifest.save(&global.deployments) {
                warn!("Could not record partial deployments: {}", save_err);
            }
            return Err(e);
        }
    };

    manifest.record_proxy(&args.contract, &upgraded);
    manifest.save(&global.deployments)
}

/// Print every configured network
pub fn list_networks(global: &GlobalArgs) -> Result<(), ScriptError> {
    let config = DeployConfig::load(&global.config)?;

    for (name, network) in &config.networks {
        let endpoint = match (&network.host, network.port, &network.rpc_url) {
            (Some(host), Some(port), _) => format!("{host}:{port}"),
            // Printed as configured, so placeholders keep secrets out of the output
            (_, _, Some(url)) => url.clone(),
            _ => String::new(),
        };
        println!("{name}\tnetwork_id={}\t{endpoint}", network.network_id);
    }

    Ok(())
}

/// Print the manifest of the selected network
pub fn status(global: &GlobalArgs) -> Result<(), ScriptError> {
    let config = DeployConfig::load(&global.config)?;
    config.network(&global.network)?;

    let manifest = Manifest::load(&global.deployments, &global.network)?;
    let contents = serde_json::to_string_pretty(&manifest)
        .map_err(|e| ScriptError::ReadManifest(e.to_string()))?;
    println!("{contents}");

    Ok(())
}
