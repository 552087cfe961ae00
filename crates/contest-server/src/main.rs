//! Main entry point for the contest command line tool.

use clap::Parser;
use contest_core::{COLLECTIONS, ContestService};
use contest_persistence::open_store;
use contest_server::{Cli, Configuration, command, model, startup};
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = Configuration::new(&cli)?;
    let _logging_guard = startup::init_logging(&configuration.logging_config()?)?;

    let store_options = configuration.store_options()?;
    debug!(mode = %store_options.mode, path = %store_options.path.display(), "Opening record store");
    let store = open_store(&store_options, COLLECTIONS)?;
    let service = ContestService::new(store, configuration.validation_policy()?);

    match command::execute(&service, &cli.command).await {
        Ok(data) => {
            println!("{}", serde_json::to_string_pretty(&model::Result::success(data))?);
            Ok(())
        }
        Err(e) => {
            warn!(kind = %e.kind(), error = %e, "Command failed");
            println!("{}", serde_json::to_string_pretty(&model::Result::fail(&e))?);
            Err(e.into())
        }
    }
}
