//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sitecache_client::ControlMessage;

/// sitecache - offline-first cache controller for a static site
#[derive(Parser, Debug)]
#[command(name = "sitecache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Override the cache database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install the configured version and activate it (or wait)
    Start,

    /// Route a request through the controller
    Fetch {
        /// Absolute URL or origin-relative path
        url: String,

        /// HTTP method
        #[arg(short, long, default_value = "GET")]
        method: String,

        /// Treat the request as a top-level navigation
        #[arg(long)]
        document: bool,
    },

    /// Send a control message (force-activate, purge-cache)
    Message {
        #[arg(value_parser = parse_message)]
        kind: ControlMessage,
    },

    /// Show lifecycle state and store contents
    Status,
}

fn parse_message(s: &str) -> Result<ControlMessage, String> {
    s.parse::<ControlMessage>().map_err(|e| e.to_string())
}

impl Cli {
    /// Default log filter for the verbosity flag; RUST_LOG still wins.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
