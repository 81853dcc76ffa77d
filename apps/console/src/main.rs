mod app;
mod commands;
mod config;
mod events;
mod render;
mod routes;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{HttpApi, SessionAuthority};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use crate::{app::Console, config::load_settings};

#[derive(Parser, Debug)]
#[command(about = "Terminal admin console for customers and orders")]
struct Args {
    /// Backend base url; overrides config file and environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long, default_value = "console.toml")]
    config: PathBuf,
    /// tracing filter directive, e.g. `info,client_core=debug`.
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config)?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(log_filter) = args.log_filter {
        settings.log_filter = log_filter;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_filter)
                .with_context(|| format!("invalid log filter '{}'", settings.log_filter))?,
        )
        .with_writer(std::io::stderr)
        .init();

    let api = Arc::new(HttpApi::new(&settings.server_url)?);
    tracing::info!(server_url = %api.base_url(), "starting order console");

    let session = SessionAuthority::new(api.clone());
    tokio::spawn({
        let session = Arc::clone(&session);
        async move {
            session.resolve().await;
        }
    });

    Console::new(api, session)
        .run(BufReader::new(tokio::io::stdin()))
        .await
}
