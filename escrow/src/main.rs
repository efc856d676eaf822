// Copyright (c) 2022, Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0
use clap::Parser;
use escrow::config::{Config, EscrowConfig};
use escrow::escrow_commands::{EscrowContext, EscrowOpts};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), anyhow::Error> {
    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .without_time()
        .compact();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(format)
        .init();

    let options = EscrowOpts::parse();
    let config = EscrowConfig::read_or_create(&options.config)?;
    let mut context = EscrowContext::new(config)?;
    options
        .command
        .execute(&mut context)?
        .print(!options.json);
    Ok(())
}
