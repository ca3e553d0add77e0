//! CLI argument parsing for gs

use clap::{Parser, Subcommand};
use eyre::Result;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "gs")]
#[command(author, version, about = "Run and check multi-tenant state scenarios", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register a scenario's tenants, run its steps and print the global state
    Run {
        /// Scenario file (YAML)
        #[arg(required = true)]
        scenario: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,

        /// Print the global state on every change
        #[arg(short, long)]
        watch: bool,

        /// Report every store action through the logger chain
        #[arg(short, long)]
        debug: bool,
    },

    /// Validate a scenario without running it
    Check {
        /// Scenario file (YAML)
        #[arg(required = true)]
        scenario: PathBuf,
    },
}

/// Output format for state dumps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    /// Render a state value; JSON is pretty-printed unless `compact`
    pub fn render(&self, state: &Value, compact: bool) -> Result<String> {
        match self {
            Self::Json if compact => Ok(serde_json::to_string(state)?),
            Self::Json => Ok(serde_json::to_string_pretty(state)?),
            Self::Yaml => Ok(serde_yaml::to_string(state)?),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(format!("Unknown format: {}. Use: json or yaml", s)),
        }
    }
}
