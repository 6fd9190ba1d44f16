use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(about = "Keep tasks in sync with external trackers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional JSON file with sync settings
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage internal tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage integrations with external trackers
    Integration {
        #[command(subcommand)]
        command: IntegrationCommands,
    },
    /// Sync single tasks and inspect sync state
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Run the scheduler for every enabled integration until Ctrl-C
    Run,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task
    #[command(alias = "new")]
    Add {
        /// Task title
        title: Vec<String>,
        #[arg(short, long, default_value = "default")]
        workspace: String,
        /// Task body
        #[arg(long)]
        content: Option<String>,
    },
    /// List tasks of a workspace
    List {
        #[arg(short, long, default_value = "default")]
        workspace: String,
        /// Include archived tasks
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one task
    Show {
        /// Task ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update fields of a task
    Edit {
        /// Task ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// New body; pass an empty string to clear it
        #[arg(long)]
        content: Option<String>,
        /// todo, in_progress, blocked, done or cancelled
        #[arg(long)]
        status: Option<String>,
        #[arg(long, conflicts_with = "unarchive")]
        archive: bool,
        #[arg(long)]
        unarchive: bool,
    },
}

#[derive(Subcommand)]
pub enum IntegrationCommands {
    /// Connect a workspace to an external provider
    Add {
        /// Provider name (local_file, memory, notion, linear, todoist)
        provider: String,
        /// Provider-side container; a directory for local_file
        target: String,
        #[arg(short, long, default_value = "default")]
        workspace: String,
        /// Scheduler interval in seconds
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// List integrations
    List {
        /// Only integrations of this workspace
        #[arg(short, long)]
        workspace: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Turn sync on for an integration
    Enable {
        /// Integration ID
        id: String,
    },
    /// Turn sync off for an integration
    Disable {
        /// Integration ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Push a task to its integration now
    Push { task: String, integration: String },
    /// Pull the external record into a task now
    Pull { task: String, integration: String },
    /// Show sync metadata for a task and integration
    Status {
        task: String,
        integration: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check one pair for a conflict, or list all conflicted pairs
    Conflicts {
        #[arg(requires = "integration")]
        task: Option<String>,
        integration: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Settle a conflict
    Resolve {
        task: String,
        integration: String,
        /// internal-wins, external-wins or manual
        #[arg(long)]
        strategy: String,
        /// Merged title (manual strategy)
        #[arg(long)]
        title: Option<String>,
        /// Merged body (manual strategy)
        #[arg(long)]
        content: Option<String>,
    },
    /// Show run statistics and recent history of an integration
    Stats {
        integration: String,
        /// Number of recent runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}
