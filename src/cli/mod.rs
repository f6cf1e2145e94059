//! CLI module for Lectern.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Lectern - Lecture video ingestion and transcription
///
/// Fetches a lecture video, cuts it into segments, transcribes them concurrently
/// and stores a timestamped transcript per lecture.
#[derive(Parser, Debug)]
#[command(name = "lectern")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, segment and transcribe a lecture video
    Ingest {
        /// Identifier of the lecture record that owns the video
        owner_id: String,

        /// Video URL (http, https, or file:// when enabled)
        url: String,

        /// Process again even if the lecture is done or looks in progress
        #[arg(short, long)]
        force: bool,
    },

    /// Show processing status (all lectures if no ID is given)
    Status {
        /// Lecture ID
        owner_id: Option<String>,
    },

    /// Print or save the stored transcript of a lecture
    Transcript {
        /// Lecture ID
        owner_id: String,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
