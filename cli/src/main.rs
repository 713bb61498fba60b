//! convoy: command-line front end to the reconciliation engine.
//!
//! # Usage
//!
//! ```text
//! convoy plan --current state.json --target release.yaml
//! convoy teardown --current state.json
//! convoy simulate --target release.yaml --json
//! convoy validate --target release.yaml
//! ```

mod args;
mod commands;

use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use convoy_core::data::settings;
use convoy_core::Settings;

use args::{Args, Command};


fn main() {
    let args = Args::parse();
    match run(args) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("convoy: {:#}", e);
            process::exit(1);
        }
    }
}


fn run(args: Args) -> Result<String> {
    let settings = settings::load_or_default(args.config.as_deref()).context("loading settings")?;
    init_tracing(&settings);

    match args.command {
        Command::Plan {
            current,
            target,
            context,
            started,
        } => commands::plan(&current, &target, context.as_deref(), &started, &settings, args.json),
        Command::Teardown { current, context } => {
            commands::teardown(&current, context.as_deref(), &settings, args.json)
        }
        Command::Simulate {
            target,
            current,
            context,
            max_passes,
        } => commands::simulate(
            &target,
            current.as_deref(),
            context.as_deref(),
            max_passes,
            &settings,
            args.json,
        ),
        Command::Validate { target } => commands::validate(&target, args.json),
    }
}


/// Logs go to stderr so stdout stays parseable. `RUST_LOG` overrides the
/// filter from settings.
fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
