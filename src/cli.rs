use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labstate")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile declared GitLab objects against the REST API", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ~/.config/labstate/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// API base URL, e.g. https://gitlab.example.com/api/v4
    #[arg(long, global = true, env = "GITLAB_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Personal or project access token
    #[arg(long, global = true, env = "GITLAB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List every resource and data-source kind
    Kinds,

    /// Refresh one object; reports when it no longer exists
    Read(ObjectArgs),

    /// Adopt an existing object by its identifier
    Import(ObjectArgs),

    /// Check that a destroyed object is really gone
    Verify(VerifyArgs),

    /// Query a data source
    Data(DataArgs),

    /// Apply a desired-state document
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ObjectArgs {
    /// Resource kind, e.g. gitlab_project_badge
    pub kind: String,

    /// Composite identifier, e.g. 42:17
    pub id: String,
}

#[derive(Parser)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub object: ObjectArgs,

    /// Last tracked state as JSON, or @FILE to read it from a file
    #[arg(long, value_name = "JSON")]
    pub tracked: String,
}

#[derive(Parser)]
pub struct DataArgs {
    /// Data-source kind, e.g. gitlab_project_milestones
    pub kind: String,

    /// Query arguments as JSON, or @FILE to read them from a file
    #[arg(long, default_value = "{}", value_name = "JSON")]
    pub query: String,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// TOML document with [[object]] entries
    pub document: PathBuf,

    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Number of parallel jobs
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Only apply objects of this kind (or kind prefix)
    #[arg(long)]
    pub kind: Option<String>,
}
