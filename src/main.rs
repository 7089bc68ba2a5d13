use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use env_logger::Env;
use log::info;

use cutoff_finder::config::Config;
use cutoff_finder::state::AppState;
use cutoff_finder::web;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    config.validate().map_err(|e| anyhow!(e))?;

    info!("Loading cutoff data from {}", config.data_path.display());
    let state = AppState::load(config).context("loading cutoff data")?;

    web::serve(Arc::new(state)).await
}
