//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the war council engine.

use clap::{Parser, Subcommand};

/// War Council - multi-agent debate with a hidden impostor
///
/// Seats ten council personas, opens the scene with a narrator, lets them
/// argue turn by turn and removes one advisor per interval until the session
/// stops.
#[derive(Parser, Debug)]
#[command(name = "war-council")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one council session and print it as it unfolds
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "COUNCIL_CONFIG")]
        config: Option<String>,

        /// Seat the persona at this index (0-9) as the impostor
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..10))]
        impostor: Option<u8>,

        /// Use the offline mock backend instead of a model server
        #[arg(long)]
        mock: bool,

        /// Override the turn ceiling
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_turns: Option<u64>,

        /// Skip the pause between turns
        #[arg(long)]
        no_pacing: bool,
    },

    /// List the council personas
    Personas,

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
