use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Compile log filter expressions into Fluent Bit stages and Lua
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Also write the output to this file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Emit stages that keep (or drop) records matching any of the filters
    Components {
        /// Tag the stages apply to
        #[arg(short, long)]
        tag: String,

        /// Drop matching records instead of keeping them
        #[arg(short = 'x', long)]
        exclude: bool,

        /// Filter expressions
        #[arg(required = true)]
        filters: Vec<String>,
    },
    /// Emit stages and Lua setting one boolean per named filter of a job file
    Script {
        /// TOML job file with a [filters] table
        #[arg(short, long)]
        config: PathBuf,

        /// Override the tag from the job file
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Print the JSON lines of a file that match a filter
    Check {
        /// Filter expression
        #[arg(short, long)]
        filter: String,

        /// File with one JSON record per line
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

pub fn cli_parse() -> Cli {
    Cli::parse()
}
