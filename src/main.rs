// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use anyhow::{anyhow, Context, Result};
use city_streets::{config::Configs, source::JsonStreetSource, start_consumer, start_publisher};
use clap::{arg, command, value_parser, ArgMatches, Command};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let matches = match cli().try_get_matches() {
        Ok(m) => m,
        Err(err) => {
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(err) = run(&matches).await {
        error!(error = format!("{err:#}"), "city-streets failed");
        std::process::exit(1);
    }
}

fn cli() -> Command {
    command!()
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("publish")
                .about("Publish the streets of a city once")
                .arg(arg!(<CITY> "The city the streets belong to"))
                .arg(
                    arg!(-s --streets <PATH> "JSON array of streets to publish, read from stdin when omitted")
                        .required(false)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(Command::new("consume").about("Consume streets into MongoDB until Ctrl-C"))
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let cfg = Configs::from_env().context("load configuration")?;

    match matches.subcommand() {
        Some(("publish", sub)) => {
            let city = sub
                .get_one::<String>("CITY")
                .ok_or_else(|| anyhow!("Usage: publish <cityName>"))?;
            let source = JsonStreetSource::new(sub.get_one::<PathBuf>("streets").cloned());

            start_publisher(&cfg, city, &source)
                .await
                .with_context(|| format!("publish streets of {city}"))
        }
        Some(("consume", _)) => {
            info!("starting consumer...");
            start_consumer(cfg, shutdown_signal())
                .await
                .context("consume streets")
        }
        Some((other, _)) => Err(anyhow!("Unknown command: {other}")),
        None => Err(anyhow!("Usage: city-streets <publish|consume>")),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = err.to_string(), "failure to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
