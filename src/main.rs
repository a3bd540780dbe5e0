//! `rig` binary: parse arguments, set up logging, dispatch a command.
use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use rig_cli::cli::{Cli, Command};
use rig_cli::commands;
use rig_cli::logging::{self, Logger};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let name = args.command.name();
    logging::init_subscriber(args.verbose, name);
    let log = Arc::new(Logger::new(name));
    let context = || commands::load_context(&args.global, &log);

    match &args.command {
        Command::Host => {
            commands::host::run(&context()?);
            Ok(())
        }
        Command::Vars(cmd) => commands::vars::run(cmd, &context()?),
        Command::Gem(cmd) => commands::gem::run(cmd, &context()?, &log),
        Command::Reports(cmd) => commands::reports::run(cmd, &context()?),
        Command::Completions(opts) => {
            clap_complete::generate(opts.shell, &mut Cli::command(), "rig", &mut std::io::stdout());
            Ok(())
        }
        Command::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
