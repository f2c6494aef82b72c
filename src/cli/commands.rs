use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dp", about = concat!("dayplan v", env!("CARGO_PKG_VERSION"), " - your day, from plain-text notes"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different vault directory
    #[arg(short = 'C', long = "vault-dir", global = true)]
    pub vault_dir: Option<String>,

    /// Log more (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the timeline for a day
    Day(DayArgs),
    /// Show one task with all its fields
    Show(ShowArgs),
    /// Show all tasks as parent/child trees
    Tree(TreeArgs),
    /// Set or clear a task's scheduled date/time
    Schedule(ScheduleArgs),
    /// Rewrite a task in a field format
    Reformat(ReformatArgs),
    /// Delete a task together with its subtasks
    Delete(DeleteArgs),
    /// Collapse or expand a task in the tree view
    Collapse(CollapseArgs),
    /// Redraw the day whenever notes change
    Watch(WatchArgs),
    /// Change vault settings
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args, Clone)]
pub struct DayArgs {
    /// Day to show, YYYY-MM-DD (default: today)
    pub date: Option<String>,
    /// Browse completed work instead of open tasks
    #[arg(long)]
    pub past: bool,
    /// Keep today's completed tasks visible
    #[arg(long)]
    pub show_completed: bool,
    /// Pretend the current time is this (YYYY-MM-DDTHH:mm)
    #[arg(long)]
    pub now: Option<String>,
    /// Calendar events as a JSON array
    #[arg(long)]
    pub events: Option<String>,
    /// Stretch length-less blocks to the next block
    #[arg(long)]
    pub extend: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Task ID (path::line)
    pub id: String,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Ignore collapsed state and show every subtask
    #[arg(long)]
    pub all: bool,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ScheduleArgs {
    /// Task ID (path::line)
    pub id: String,
    /// YYYY-MM-DD, YYYY-MM-DDTHH:mm, or `none` to clear
    pub when: String,
    /// Snap the time to the nearest quarter hour
    #[arg(long)]
    pub round: bool,
}

#[derive(Args)]
pub struct ReformatArgs {
    /// Task ID (path::line)
    pub id: String,
    /// Field format to write (default: the configured one)
    #[arg(long)]
    pub format: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Task ID (path::line)
    pub id: String,
    /// Skip confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct CollapseArgs {
    /// Task ID (path::line)
    pub id: String,
}

#[derive(Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub day: DayArgs,
    /// Stop after this many redraws
    #[arg(long)]
    pub max_redraws: Option<usize>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set the field format used when writing tasks
    FieldFormat(FieldFormatArgs),
    /// Print the effective configuration
    Show,
}

#[derive(Args)]
pub struct FieldFormatArgs {
    /// dataview, tasks, full-calendar or simple
    pub format: String,
}
