mod cli;
mod handlers;

use clap::Parser;
use cli::{Cli, Commands};
use colored::*;
use handlers::{list, run, stream};
use idem::TaskError;
use std::process;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { playbook, short } => run::handle_run(&playbook, short),
        Commands::List { playbook } => list::handle_list(&playbook),
        Commands::Glob { pattern } => stream::handle_glob(&pattern),
        Commands::Stream { values } => stream::handle_stream(&values),
    };

    if let Err(e) = result {
        match e.downcast_ref::<TaskError>() {
            // The failure block has already been printed by the reporter.
            Some(err @ TaskError::Failed { .. }) => process::exit(err.exit_code()),
            Some(err) => {
                eprintln!("{} {}", "❌".red(), err);
                process::exit(err.exit_code());
            }
            None => {
                eprintln!("{} {:#}", "❌".red(), e);
                process::exit(1);
            }
        }
    }
}
