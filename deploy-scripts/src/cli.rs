//! Definitions of CLI arguments and commands for the migration scripts

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    commands::{list_networks, migrate, status, upgrade},
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_CONFIG_PATH, DEFAULT_DEPLOYMENTS_DIR, DEFAULT_NETWORK,
    },
    errors::ScriptError,
    migrations::MigrationRange,
};

/// Deploy and upgrade the UKH contracts behind upgradeable proxies
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Arguments shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by every command
#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Path to the network configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Name of the network to run against
    #[arg(short, long, env = "NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// Directory containing the compiled contract artifacts
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts: PathBuf,

    /// Directory holding the per-network deployment manifests
    #[arg(long, default_value = DEFAULT_DEPLOYMENTS_DIR)]
    pub deployments: PathBuf,
}

/// The available commands
#[derive(Subcommand)]
pub enum Command {
    /// Run pending migrations
    Migrate(MigrateArgs),
    /// Upgrade a deployed proxy to a new implementation
    Upgrade(UpgradeArgs),
    /// List the configured networks
    Networks,
    /// Print the deployments recorded for the selected network
    Status,
}

impl Command {
    /// Run the command
    pub async fn run(self, global: &GlobalArgs) -> Result<(), ScriptError> {
        match self {
            Command::Migrate(args) => migrate(args, global).await,
            Command::Upgrade(args) => upgrade(args, global).await,
            Command::Networks => list_networks(global),
            Command::Status => status(global),
        }
    }
}

/// Run the migrations not yet recorded as completed.
///
/// Each migration deploys one contract behind a `TransparentUpgradeableProxy`
/// and calls its initializer in the same transaction.
#[derive(Args, Clone, Debug)]
pub struct MigrateArgs {
    /// Run from this migration number, regardless of recorded progress
    #[arg(short, long)]
    pub from: Option<u32>,

    /// Stop after this migration number
    #[arg(short, long)]
    pub to: Option<u32>,

    /// Run every migration from the first one
    #[arg(long)]
    pub reset: bool,
}

impl From<&MigrateArgs> for MigrationRange {
    fn from(args: &MigrateArgs) -> Self {
        MigrationRange {
            from: args.from,
            to: args.to,
            reset: args.reset,
        }
    }
}

/// Upgrade a proxy.
///
/// Deploys the contract's current artifact as a new implementation and points
/// the proxy at it through the network's `ProxyAdmin`.
#[derive(Args, Clone, Debug)]
pub struct UpgradeArgs {
    /// Name of the proxied contract to upgrade
    #[arg(long)]
    pub contract: String,

    /// Optional function to call on the new implementation while upgrading
    #[arg(long)]
    pub call: Option<String>,

    /// Arguments for the function given with `--call`, e.g. `--args -5 0x01`.
    /// They may start with a hyphen, so pass them last
    #[arg(long, num_args = 1.., requires = "call", allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::try_parse_from([
            "deploy-scripts",
            "--network",
            "rinkeby",
            "migrate",
            "--from",
            "2",
            "--reset",
        ])
        .unwrap();

        assert_eq!(cli.global.network, "rinkeby");
        assert_eq!(cli.global.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        let Command::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        assert_eq!(
            MigrationRange::from(&args),
            MigrationRange {
                from: Some(2),
                to: None,
                reset: true
            }
        );
    }

    #[test]
    fn test_parse_upgrade() {
        let cli = Cli::try_parse_from([
            "deploy-scripts",
            "upgrade",
            "--contract",
            "UKHToken",
            "--call",
            "setFee",
            "--args",
            "10",
            "20",
        ])
        .unwrap();

        let Command::Upgrade(args) = cli.command else {
            panic!("expected upgrade");
        };
        assert_eq!(args.contract, "UKHToken");
        assert_eq!(args.call.as_deref(), Some("setFee"));
        assert_eq!(args.args, vec!["10".to_string(), "20".to_string()]);
    }

    #[test]
    fn test_parse_negative_upgrade_args() {
        let cli = Cli::try_parse_from([
            "deploy-scripts",
            "upgrade",
            "--contract",
            "UKHPool",
            "--call",
            "setDelta",
            "--args",
            "-5",
            "7",
        ])
        .unwrap();

        let Command::Upgrade(args) = cli.command else {
            panic!("expected upgrade");
        };
        assert_eq!(args.args, vec!["-5".to_string(), "7".to_string()]);
    }

    #[test]
    fn test_upgrade_args_require_call() {
        let res = Cli::try_parse_from([
            "deploy-scripts",
            "upgrade",
            "--contract",
            "UKHToken",
            "--args",
            "10",
        ]);

        assert!(res.is_err());
    }
}
