#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

use anyhow::{Context, Result};
use clap::Parser;
use tollgate::Config;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod app;
mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_init()?,
    };
    app::dispatch::dispatch(cli, config).await
}
