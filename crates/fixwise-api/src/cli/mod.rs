//! CLI command definitions for the `fixwise` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Diagnose broken items and get walked through the repair.
#[derive(Parser)]
#[command(name = "fixwise", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export trace spans to stdout via OpenTelemetry.
    #[arg(long, global = true, hide = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message (and optionally a photo) to a repair session.
    Ask {
        /// Session id. Created on first use unless strict sessions are on.
        session: String,

        /// What you want to say.
        text: Option<String>,

        /// Photo of the broken item.
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Show a session's conversation history.
    History {
        session: String,
    },

    /// List stored sessions, most recently active first.
    #[command(alias = "ls")]
    Sessions {
        /// Maximum number of sessions to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// Delete a session. Deleting an unknown session is not an error.
    #[command(alias = "rm")]
    Delete {
        session: String,
    },

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Keep sessions in memory instead of the SQLite database.
        #[arg(long)]
        memory: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
