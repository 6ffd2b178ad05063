use clap::Parser;
use deploy_scripts::{cli::Cli, errors::ScriptError};

#[tokio::main]
async fn main() -> Result<(), ScriptError> {
    // The variables may also be exported directly, so a missing `.env` is fine
    dotenvy::dotenv().ok();

    let Cli { global, command } = Cli::parse();

    tracing_subscriber::fmt().pretty().init();

    command.run(&global).await
}
