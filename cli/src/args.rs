//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "convoy")]
#[command(version, about = "Plan and simulate container app reconciliation", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (YAML)
    #[arg(long, global = true, env = "CONVOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print steps as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute the next batch of steps from a current snapshot to a release
    Plan {
        /// Observed state snapshot (JSON or YAML)
        #[arg(long)]
        current: PathBuf,

        /// Release manifest (JSON or YAML)
        #[arg(long)]
        target: PathBuf,

        /// Execution context: images, downloads, container ids
        #[arg(long)]
        context: Option<PathBuf>,

        /// Container ids a start was already requested for
        #[arg(long = "started", value_name = "CONTAINER_ID")]
        started: Vec<String>,
    },

    /// Compute the next batch of steps removing an app
    Teardown {
        #[arg(long)]
        current: PathBuf,

        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// Converge a simulated device to a release and print every batch
    Simulate {
        #[arg(long)]
        target: PathBuf,

        /// Starting state (defaults to an empty device)
        #[arg(long)]
        current: Option<PathBuf>,

        #[arg(long)]
        context: Option<PathBuf>,

        /// Pass limit (overrides the settings file)
        #[arg(long)]
        max_passes: Option<u32>,
    },

    /// Check a release manifest without planning anything
    Validate {
        #[arg(long)]
        target: PathBuf,
    },
}
