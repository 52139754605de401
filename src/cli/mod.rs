//! Command-line interface for leadline
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::reconciler::Viewer;
use crate::storage::Storage;

mod activity;
mod notify;
mod task;

/// leadline - lead and task tracking with task notifications
///
/// Tracks sales tasks in a local data directory and reconciles them into
/// assignment and status-change notifications.
#[derive(Parser, Debug)]
#[command(name = "leadline")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "LEADLINE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Viewer user id
    #[arg(long, global = true, env = "LEADLINE_USER")]
    pub user: Option<String>,

    /// View as a privileged (admin/team-lead) user
    #[arg(long, global = true)]
    pub privileged: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Task records
    #[command(subcommand)]
    Task(TaskCommands),

    /// Task notifications
    #[command(subcommand)]
    Notify(NotifyCommands),

    /// Call and status activity trail
    #[command(subcommand)]
    Activity(ActivityCommands),
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Add {
        title: String,

        /// low, medium, high, urgent
        #[arg(long, default_value = "medium")]
        priority: String,

        /// Assignee user id
        #[arg(long)]
        assignee: Option<String>,

        #[arg(long)]
        assignee_name: Option<String>,

        /// Who assigned the task
        #[arg(long)]
        assigner_name: Option<String>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },

    /// Update task fields
    Update {
        id: String,

        /// pending, in_progress, completed, cancelled
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        #[arg(long)]
        assignee: Option<String>,

        #[arg(long)]
        assignee_name: Option<String>,

        /// Name recorded as the editor
        #[arg(long)]
        by: Option<String>,
    },

    /// List tasks, most recently updated first
    List {
        #[arg(long)]
        assignee: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum NotifyCommands {
    /// Run one reconciliation tick and print the notification list
    Poll,

    /// Keep polling and show alerts as they arrive
    Watch {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<usize>,

        /// Override the role's poll interval (e.g. "10s")
        #[arg(long)]
        interval: Option<String>,

        /// Write alerts as JSON lines to this file ("-" for stdout)
        #[arg(long)]
        alert_log: Option<PathBuf>,
    },

    /// Mark one notification as read
    Read { id: String },

    /// Mark every listed notification as read
    ReadAll,
}

#[derive(Subcommand, Debug)]
pub enum ActivityCommands {
    /// Record a call or note against a task
    Add {
        task_id: String,

        /// call or note
        #[arg(long, default_value = "call")]
        kind: String,

        #[arg(long)]
        note: Option<String>,
    },

    /// List recorded activity
    List {
        #[arg(long)]
        task: Option<String>,
    },
}

/// Resolved storage, config, clock and viewer for one invocation.
pub(crate) struct AppContext {
    pub storage: Storage,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub viewer: Viewer,
    pub output: OutputOptions,
}

impl AppContext {
    fn load(cli: &Cli) -> Result<Self> {
        let root = Storage::resolve_root(cli.data_dir.as_deref())?;
        let config = Config::load_from_dir(&root)?;
        let storage = Storage::new(root).with_lock_timeout(config.storage.lock_timeout_ms);
        storage.init()?;

        let viewer = Viewer {
            user_id: cli.user.clone().or_else(|| config.viewer.user.clone()),
            privileged: cli.privileged || config.viewer.privileged,
        };

        Ok(Self {
            storage,
            config,
            clock: Arc::new(SystemClock),
            viewer,
            output: OutputOptions {
                json: cli.json,
                quiet: cli.quiet,
            },
        })
    }

    pub fn require_user(&self) -> Result<&str> {
        self.viewer
            .user_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(Error::UserRequired)
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = AppContext::load(&self)?;
        match self.command {
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add {
                    title,
                    priority,
                    assignee,
                    assignee_name,
                    assigner_name,
                    due,
                } => task::run_add(
                    &ctx,
                    task::AddOptions {
                        title,
                        priority,
                        assignee,
                        assignee_name,
                        assigner_name,
                        due,
                    },
                ),
                TaskCommands::Update {
                    id,
                    status,
                    priority,
                    assignee,
                    assignee_name,
                    by,
                } => task::run_update(
                    &ctx,
                    task::UpdateOptions {
                        id,
                        status,
                        priority,
                        assignee,
                        assignee_name,
                        by,
                    },
                ),
                TaskCommands::List { assignee } => task::run_list(&ctx, assignee),
            },
            Commands::Notify(cmd) => match cmd {
                NotifyCommands::Poll => notify::run_poll(&ctx),
                NotifyCommands::Watch {
                    ticks,
                    interval,
                    alert_log,
                } => notify::run_watch(&ctx, ticks, interval, alert_log.as_deref()),
                NotifyCommands::Read { id } => notify::run_read(&ctx, &id),
                NotifyCommands::ReadAll => notify::run_read_all(&ctx),
            },
            Commands::Activity(cmd) => match cmd {
                ActivityCommands::Add { task_id, kind, note } => {
                    activity::run_add(&ctx, &task_id, &kind, note)
                }
                ActivityCommands::List { task } => activity::run_list(&ctx, task.as_deref()),
            },
        }
    }
}
