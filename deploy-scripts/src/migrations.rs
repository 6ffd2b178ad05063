//! The ordered migrations deploying the UKH suite.
//!
//! Migrations run one at a time, in numeric order. The manifest records the
//! last migration that completed, so a later run only picks up new ones.

use tracing::{info, warn};

use crate::{
    constants::DEFAULT_INITIALIZER, deployer::ProxyDeployer, errors::ScriptError,
    manifest::Manifest,
};

/// The admin address the box contract is initialized with
pub const BOX_ADMIN: &str = "0x8dD9c91E7e4CE76FB7d0aBb53e363812abD567f7";

/// What a migration deploys behind a proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// The artifact name of the contract
    pub contract: String,
    /// The initializer's arguments, in order
    pub args: Vec<String>,
    /// The function called once after deployment, if any
    pub initializer: Option<String>,
}

/// A numbered deployment step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// The migration's position in the sequence, starting at 1
    pub number: u32,
    /// A short description
    pub name: &'static str,
    /// The proxy deployment the migration performs
    pub record: DeploymentRecord,
}

/// Which migrations a run covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationRange {
    /// First migration to run, overriding the recorded progress
    pub from: Option<u32>,
    /// Last migration to run
    pub to: Option<u32>,
    /// Ignore recorded progress and start from the first migration
    pub reset: bool,
}

impl DeploymentRecord {
    /// A proxied deployment initialized through `initialize`
    fn initialized(contract: &str, args: &[&str]) -> Self {
        Self {
            contract: contract.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            initializer: Some(DEFAULT_INITIALIZER.to_string()),
        }
    }
}

/// The UKH migrations, in the order they run
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration {
            number: 1,
            name: "initial_migration",
            record: DeploymentRecord::initialized("MyContract", &[BOX_ADMIN]),
        },
        Migration {
            number: 2,
            name: "deploy_token",
            record: DeploymentRecord::initialized("UKHToken", &[]),
        },
        Migration {
            number: 3,
            name: "deploy_pool_contract",
            // TODO: replace the placeholders with the token proxy address and the pool amount
            record: DeploymentRecord::initialized("UKHPool", &["t", "amount"]),
        },
    ]
}

impl MigrationRange {
    /// The migrations to run, given the last one recorded as completed
    pub fn select<'a>(&self, migrations: &'a [Migration], last_completed: u32) -> Vec<&'a Migration> {
        let first = match (self.from, self.reset) {
            (Some(from), _) => from,
            (None, true) => 1,
            (None, false) => last_completed.saturating_add(1),
        };
        let last = self.to.unwrap_or(u32::MAX);

        if first > last {
            warn!("Empty migration range {}..={}", first, last);
        }

        migrations
            .iter()
            .filter(|m| (first..=last).contains(&m.number))
            .collect()
    }
}

/// Run the selected migrations in order.
///
/// Each migration calls the deployer exactly once. After it succeeds the
/// proxy and progress are recorded and `persist` is called, so a failure
/// leaves every earlier migration recorded. The first failure ends the run,
/// after persisting whatever the failed migration managed to deploy.
///
/// Returns the numbers of the migrations that ran.
pub async fn run_migrations<D, P>(
    deployer: &mut D,
    manifest: &mut Manifest,
    migrations: &[Migration],
    range: &MigrationRange,
    mut persist: P,
) -> Result<Vec<u32>, ScriptError>
where
    D: ProxyDeployer,
    P: FnMut(&Manifest) -> Result<(), ScriptError>,
{
    let selected = range.select(migrations, manifest.last_completed_migration);
    if selected.is_empty() {
        info!("Network `{}` is up to date", manifest.network);
    }

    let mut ran = Vec::with_capacity(selected.len());
    for migration in selected {
        info!(
            "Running migration {}_{}: {}",
            migration.number, migration.name, migration.record.contract
        );

        let deployed = match deployer.deploy_proxy(&migration.record, manifest).await {
            Ok(deployed) => deployed,
            Err(e) => {
                if let Err(save_err) = persist(manifest) {
                    warn!("Could not record partial deployments: {}", save_err);
                }
                return Err(e);
            }
        };
        manifest.record_proxy(&migration.record.contract, &deployed);
        manifest.last_completed_migration = migration.number;
        persist(manifest)?;

        info!(
            "{} proxy deployed at {:#x} (implementation {:#x})",
            migration.record.contract, deployed.proxy, deployed.implementation
        );
        ran.push(migration.number);
    }

    Ok(ran)
}
