use anyhow::Result;
use clap::Parser;

use hub_client::{
    cli::{Cli, Command},
    demo,
};

fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match cli.command {
        Command::Swarm(args) => demo::swarm(args).await?,
        Command::Stocks(args) => demo::stocks(args).await?,
        Command::Chat(args) => demo::chat(args).await?,
    }

    Ok(())
}
