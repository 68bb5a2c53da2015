// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "adc-hub", about = "A pure-Rust ADC directory hub")]
pub struct Cli {
    /// Path to the hub configuration YAML file.
    #[arg(short, long, default_value = "config/hub.yaml")]
    pub config: PathBuf,

    /// Path to the ACL file (accounts, restricted nicks, bans).
    #[arg(short, long, default_value = "config/acl.yaml")]
    pub acl: PathBuf,

    /// Path to the logger configuration YAML file.
    #[arg(short, long, default_value = "config/logger.yaml")]
    pub logger: PathBuf,
}
