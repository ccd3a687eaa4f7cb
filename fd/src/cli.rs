//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::filter::{FilterError, parse_criterion};

/// fleetd - fleet coordinator
#[derive(Parser)]
#[command(
    name = "fd",
    about = "Track agent slots and install or terminate assignments across a fleet",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Override the server socket path
    #[arg(short, long, global = true, help = "Server socket path")]
    pub socket: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the coordinator server in the foreground
    Serve,

    /// List slots across the fleet
    Slots {
        /// Filter criterion key=value (id, host, state, binary, config); repeatable
        #[arg(short = 'f', long = "filter", value_name = "KEY=VALUE", value_parser = criterion)]
        criteria: Vec<(String, String)>,

        /// Output format
        #[arg(short = 'o', long, default_value = "text")]
        format: OutputFormat,
    },

    /// List agents
    Agents {
        /// Filter criterion key=value (id, host, state); repeatable
        #[arg(short = 'f', long = "filter", value_name = "KEY=VALUE", value_parser = criterion)]
        criteria: Vec<(String, String)>,

        /// Output format
        #[arg(short = 'o', long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one agent
    Agent {
        /// Agent id
        id: String,

        /// Output format
        #[arg(short = 'o', long, default_value = "text")]
        format: OutputFormat,
    },

    /// Install an assignment on matching agents
    Install {
        /// Binary coordinate, e.g. food.fruit:apple:1.0
        binary: String,

        /// Config coordinate, e.g. @prod:apple:1.0
        config_set: String,

        /// Agent filter criterion key=value (id, host, state); repeatable
        #[arg(short = 'f', long = "filter", value_name = "KEY=VALUE", value_parser = criterion)]
        criteria: Vec<(String, String)>,

        /// Maximum number of agents to install on
        #[arg(short = 'n', long, default_value = "1")]
        limit: usize,

        /// Output format
        #[arg(short = 'o', long, default_value = "text")]
        format: OutputFormat,
    },

    /// Terminate matching slots
    Terminate {
        /// Slot filter criterion key=value; at least one is required
        #[arg(short = 'f', long = "filter", value_name = "KEY=VALUE", value_parser = criterion, required = true)]
        criteria: Vec<(String, String)>,

        /// Output format
        #[arg(short = 'o', long, default_value = "text")]
        format: OutputFormat,
    },

    /// Mark an agent offline
    Offline {
        /// Agent id
        id: String,
    },

    /// Send an agent status announcement from a JSON file ("-" for stdin)
    Announce {
        /// Path to the status document
        file: PathBuf,
    },

    /// Check that the server is alive
    Ping,

    /// Ask the server to shut down
    Stop,

    /// Show server logs
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value = "50")]
        lines: usize,
    },
}

fn criterion(s: &str) -> Result<(String, String), FilterError> {
    parse_criterion(s)
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fleetd")
        .join("logs")
        .join("fleetd.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Output format for listing commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" | "table" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
