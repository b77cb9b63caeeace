//! store-cli
//!
//! Ambient convenience binary over an in-process registry; not a wire
//! protocol and not part of the core's contract.

use clap::{Parser, Subcommand};
use store_logging::Profile;

mod app;
mod commands;
mod config;
mod demo;

use app::AppContext;
use config::StoreCliConfig;

#[derive(Debug, Parser)]
#[command(name = "store-cli")]
#[command(about = "Content-addressed entity store: manual exploration harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Invoke a registered function.
    Call(commands::call::CallArgs),
    /// Resolve an address and print the value.
    Get(commands::get::GetArgs),
    /// Print a lineage's published version history.
    History(commands::history::HistoryArgs),
    /// Publish and run a seed scenario for manual exploration.
    PublishDemo(commands::publish_demo::PublishDemoArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    store_logging::init(Profile::Development);

    let cli = Cli::parse();
    let config = StoreCliConfig::load()?;
    let ctx = AppContext::bootstrap(&config).await?;

    let result = match cli.command {
        Commands::Call(args) => commands::call::execute(&ctx, args).await,
        Commands::Get(args) => commands::get::execute(&ctx, args).await,
        Commands::History(args) => commands::history::execute(&ctx, args).await,
        Commands::PublishDemo(args) => commands::publish_demo::execute(&ctx, args).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
    Ok(())
}
