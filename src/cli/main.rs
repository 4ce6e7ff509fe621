use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rss_aggregator::{
    commands,
    config::Configuration,
    core::Command,
    fetch::{ClientOptions, FeedClient},
    state::State,
    storage::sqlite,
};

#[derive(clap::Parser, Debug)]
#[command(about = "Collects RSS and Atom feeds into a local database")]
struct Args {
    /// Configuration file, `~/.aggregator.toml` by default
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Command to run, `help` lists them
    command: String,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn login() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "anonymous".to_owned())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::debug!("Run with args {args:?}");

    let config_path = match args.config {
        Some(path) => path,
        None => Configuration::default_path()?,
    };
    let config = Configuration::read(&config_path)?;

    let store = sqlite::connect(&config.db_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.db_url))?;
    let client = FeedClient::new(&ClientOptions::for_login(
        &login(),
        config.request_timeout(),
    ))?;

    let mut state = State::new(config, config_path, Arc::new(store), client);

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, shutting down");
            shutdown.trigger();
        }
    });

    let registry = commands::builtin();
    registry
        .run(&mut state, &Command::new(args.command, args.args))
        .await?;

    Ok(())
}
