// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use adc_hub::{
    acl::Acl,
    cfg::{cli::Cli, config::Config, logger::init_logger},
    connection,
    hub::HubController,
};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _logger_guard = init_logger(
        cli.logger
            .to_str()
            .context("logger config path is not valid UTF-8")?,
    )
    .context("failed to initialize logger")?;

    let config = Config::load_from_file(&cli.config).context("failed to load hub config")?;
    let acl = Acl::load_from_file(&cli.acl).context("failed to load ACL file")?;

    info!(hub_name = %config.identity.hub_name, "starting adc-hub");

    let bind_addr = config.network.bind_addr;
    let hub = Arc::new(Mutex::new(HubController::new(config, acl)));

    let listener = tokio::spawn(connection::run(bind_addr, hub.clone()));

    tokio::select! {
        result = listener => {
            result.context("listener task panicked")??;
        },
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            hub.lock().await.shutdown();
        },
    }

    Ok(())
}
