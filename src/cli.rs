//! Command-line interface definitions.
use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the provisioning engine.
#[derive(Parser, Debug)]
#[command(name = "rig", about = "Declarative host provisioning engine", version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Settings file (defaults to $XDG_CONFIG_HOME/rig/rig.toml)
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show how this host is classified
    Host,
    /// Inspect and edit saved variables
    #[command(subcommand)]
    Vars(VarsCommand),
    /// Check or install Ruby gems
    #[command(subcommand)]
    Gem(GemCommand),
    /// Inspect and deliver queued run reports
    #[command(subcommand)]
    Reports(ReportsCommand),
    /// Print shell completions to stdout
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file of this invocation.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Vars(_) => "vars",
            Self::Gem(_) => "gem",
            Self::Reports(_) => "reports",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// `vars` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum VarsCommand {
    /// List saved variables
    List,
    /// Print one variable, prompting if it has no saved value
    Get {
        /// Variable name
        name: String,
        /// Fail instead of prompting
        #[arg(long)]
        no_ask: bool,
    },
    /// Save a value for a variable
    Set {
        /// Variable name
        name: String,
        /// New value, typed like the saved one where it parses
        value: String,
    },
}

/// Package named on the command line.
#[derive(Parser, Debug, Clone)]
pub struct GemOpts {
    /// Gem name
    pub name: String,
    /// Version constraint such as ">= 1.2" or "~> 3.0"
    pub constraint: Option<String>,
}

/// `gem` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum GemCommand {
    /// Report whether a matching version is installed
    Check(GemOpts),
    /// Install the gem unless a matching version is already present
    Install {
        /// Gem name and version constraint
        #[command(flatten)]
        gem: GemOpts,
        /// Extra options appended to `gem install`
        #[arg(long, default_value = "", allow_hyphen_values = true)]
        opts: String,
        /// Attribute the gem to a public source so its outcome is reported
        #[arg(long)]
        source: Option<String>,
    },
}

/// `reports` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ReportsCommand {
    /// List reports waiting for delivery
    Pending,
    /// Deliver queued reports to the collector
    Flush,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
