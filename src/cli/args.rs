//! Command line argument parsing and validation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tag-triggered release pipeline for hyperlink
#[derive(Parser, Debug)]
#[command(
    name = "hyperlink_release",
    version,
    about = "Create a GitHub release for a tag and attach one binary per platform",
    long_about = "Create a GitHub release for a version tag and attach one binary per platform.

The whole pipeline can run in one process (`release`), or split across CI jobs:
`create` makes the release and stores its upload handle under --state-dir,
then one `build` job per platform picks the handle up and attaches its asset."
)]
pub struct Args {
    /// Command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Build target registry (TOML); defaults to the built-in linux/macos/windows set
    #[arg(long, global = true, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    /// GitHub repository (owner/repo); defaults to GITHUB_REPOSITORY
    #[arg(long, global = true, value_name = "OWNER/REPO")]
    pub repo: Option<String>,

    /// GitHub token; defaults to GH_TOKEN or GITHUB_TOKEN
    #[arg(long, global = true, value_name = "TOKEN")]
    pub github_token: Option<String>,

    /// Project directory the builds run in
    #[arg(long, global = true, value_name = "DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Directory for run state and release handles
    #[arg(long, global = true, value_name = "DIR", default_value = ".hyperlink-release")]
    pub state_dir: PathBuf,

    /// Seconds a build task waits for the release handle
    #[arg(long, global = true, value_name = "SECS", default_value_t = 30)]
    pub handoff_timeout: u64,

    /// Seconds a single build may take
    #[arg(long, global = true, value_name = "SECS", default_value_t = 3600)]
    pub build_timeout: u64,

    /// Extra argument passed to `cargo build` (repeatable, e.g. --cargo-arg=--locked)
    #[arg(long = "cargo-arg", global = true, value_name = "ARG", allow_hyphen_values = true)]
    pub cargo_args: Vec<String>,

    /// Cancel the remaining build tasks once one fails
    #[arg(long, global = true)]
    pub cancel_siblings: bool,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the whole pipeline: create the release, build and attach every target
    Release {
        /// Version tag; defaults to the tag in GITHUB_REF
        #[arg(value_name = "TAG")]
        tag: Option<String>,

        /// Run identity; a fresh id is generated when omitted
        #[arg(long, value_name = "ID")]
        run_id: Option<String>,
    },

    /// Create the release and publish its handle for later build jobs
    Create {
        /// Version tag; defaults to the tag in GITHUB_REF
        #[arg(value_name = "TAG")]
        tag: Option<String>,

        /// Run identity shared with the build jobs
        #[arg(long, value_name = "ID")]
        run_id: String,
    },

    /// Build one platform and attach its asset to the run's release
    Build {
        /// Platform identifier from the registry
        #[arg(value_name = "PLATFORM")]
        platform: String,

        /// Run identity used by the create job
        #[arg(long, value_name = "ID")]
        run_id: String,
    },

    /// Show the persisted state of a run
    Status {
        /// Run identity
        #[arg(long, value_name = "ID")]
        run_id: String,

        /// Print checkpoints and per-task details
        #[arg(short, long)]
        detailed: bool,

        /// Output the raw state as JSON
        #[arg(long)]
        json: bool,
    },

    /// End a split run: discard its release handle and report missing assets
    Finish {
        /// Run identity
        #[arg(long, value_name = "ID")]
        run_id: String,

        /// Also delete the run's state file
        #[arg(long)]
        purge_state: bool,
    },

    /// Load and check the build target registry
    Validate,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if let Some(repo) = &self.repo
            && repo.split('/').filter(|part| !part.is_empty()).count() != 2
        {
            return Err(format!(
                "Invalid repository '{}': expected owner/repo",
                repo
            ));
        }

        if self.build_timeout == 0 {
            return Err("--build-timeout must be greater than zero".to_string());
        }

        if let Command::Build { platform, .. } = &self.command
            && platform.trim().is_empty()
        {
            return Err("Platform is required".to_string());
        }

        Ok(())
    }

    /// Directory holding the durable release handles
    pub fn handoff_dir(&self) -> PathBuf {
        self.state_dir.join("handoff")
    }
}

impl Command {
    /// Get command name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::Release { .. } => "release",
            Command::Create { .. } => "create",
            Command::Build { .. } => "build",
            Command::Status { .. } => "status",
            Command::Finish { .. } => "finish",
            Command::Validate => "validate",
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new(quiet: bool) -> Self {
        Self {
            output: super::OutputManager::new(quiet),
        }
    }

    /// Print message
    pub fn println(&self, message: &str) {
        let _ = self.output.println(message);
    }

    /// Print error message (always shown)
    pub fn error_println(&self, message: &str) {
        self.output.error(message);
    }

    /// Print warning message
    pub fn warning_println(&self, message: &str) {
        let _ = self.output.warn(message);
    }

    /// Print success message
    pub fn success_println(&self, message: &str) {
        let _ = self.output.success(message);
    }

    /// Print indented text
    pub fn indent(&self, message: &str) {
        let _ = self.output.indent(message);
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.quiet)
    }
}
