//! Command-line interface definition for autolab
//!
//! This module defines the CLI structure using clap's derive API. Commands
//! that act on one assessment accept an optional `course:assessment`
//! argument and otherwise fall back to the `.autolab-asmt` file of the
//! current directory.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// autolab - command-line client for the Autolab autograding service
///
/// Download handouts, submit solutions and inspect scores without leaving
/// the terminal.
#[derive(Parser, Debug, Clone)]
#[command(name = "autolab")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "AUTOLAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Authorize this client with the Autolab service
    Setup {
        /// Run the authorization flow even if a user is already set up
        #[arg(short, long)]
        force: bool,
    },

    /// Show the assessment configured for the current directory
    Status,

    /// Create a directory for an assessment and download its handout and writeup
    Download {
        /// Assessment as `course:assessment`
        target: String,
    },

    /// Submit a file to an assessment
    ///
    /// Usage: `autolab submit [course:assessment] <file>`
    Submit {
        /// `course:assessment`, or the file when run inside an assessment directory
        first: String,

        /// File to submit when `course:assessment` is given
        second: Option<PathBuf>,

        /// Use the given names even if they conflict with the current directory
        #[arg(short, long)]
        force: bool,
    },

    /// List current courses
    Courses,

    /// List the assessments of a course
    #[command(visible_alias = "asmts")]
    Assessments {
        /// Course name
        course: String,
    },

    /// List the problems of an assessment
    Problems {
        /// Assessment as `course:assessment`
        target: Option<String>,
    },

    /// Show submission scores
    Scores {
        /// Assessment as `course:assessment`
        target: Option<String>,

        /// Show every submission instead of only the latest
        #[arg(short, long)]
        all: bool,
    },

    /// Show autograder feedback for a submission
    Feedback {
        /// Assessment as `course:assessment`
        target: Option<String>,

        /// Problem to show feedback for (defaults to the first problem)
        #[arg(short, long)]
        problem: Option<String>,

        /// Submission version (defaults to the latest)
        #[arg(short = 'n', long = "submission")]
        version: Option<u32>,
    },
}

/// Target and file of a `submit` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTarget {
    /// Explicit `course:assessment`, if given
    pub target: Option<String>,
    /// File to submit
    pub file: PathBuf,
}

impl SubmitTarget {
    /// Interprets the one or two positional arguments of `submit`
    pub fn from_args(first: &str, second: Option<&PathBuf>) -> Self {
        match second {
            Some(file) => Self {
                target: Some(first.to_string()),
                file: file.clone(),
            },
            None => Self {
                target: None,
                file: PathBuf::from(first),
            },
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
