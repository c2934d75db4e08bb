use clap::{Parser, Subcommand};
use std::path::PathBuf;
use idem::config::DEFAULT_PLAYBOOK;

#[derive(Parser)]
#[command(name = "idem", version, about = "Idem: idempotent local system configuration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every task of a playbook, in order
    #[command(visible_alias = "r")]
    Run {
        #[arg(default_value = DEFAULT_PLAYBOOK)]
        playbook: PathBuf,

        /// Skip long-running tasks (progress output or unchanged marker)
        #[arg(short = 's', long = "short")]
        short: bool,
    },

    /// List the tasks of a playbook
    #[command(visible_alias = "ls")]
    List {
        #[arg(default_value = DEFAULT_PLAYBOOK)]
        playbook: PathBuf,
    },

    /// Expand a wildcard into an escaped stream, one match per line
    Glob { pattern: String },

    /// Print values as an escaped stream, one per line
    Stream { values: Vec<String> },
}
