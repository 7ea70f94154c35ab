//! CLI module for vidquiz.

pub mod commands;
mod output;
pub mod preflight;

pub use output::{error_message, Output};

use crate::pipeline::QuizSource;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// vidquiz - Video descriptions and quizzes
///
/// Describes a video with a multimodal model, saves the description to a
/// searchable knowledge store, and writes a multiple-choice quiz about it.
#[derive(Parser, Debug)]
#[command(name = "vidquiz")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Describe a video, store the description and generate a quiz
    Run {
        /// Path to the video file (prompted for when omitted)
        #[arg(long)]
        video: Option<PathBuf>,

        /// Instruction sent with the video (prompted for when omitted)
        #[arg(short, long)]
        prompt: Option<String>,

        /// Text the quiz is generated from
        #[arg(long, value_enum, default_value_t = QuizSource::Direct)]
        quiz_source: QuizSource,

        /// Write the description and quiz as markdown files into this directory
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Ignore cached descriptions and quizzes
        #[arg(long)]
        no_cache: bool,
    },

    /// Search stored descriptions by similarity
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
    },

    /// Show one stored description
    Show {
        /// Record id printed by `run`
        record_id: String,
    },

    /// Check credentials, store connectivity and configuration
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

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
