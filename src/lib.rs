//! leadline - task notification reconciliation
//!
//! This library polls a task source on a role-dependent cadence, diffs each
//! result against the previous tick, and turns the differences into
//! assignment and status-change notifications with durable read state.
//!
//! # Core Concepts
//!
//! - **Task source**: Anything that can list task rows for a query
//! - **Snapshot**: Last observed status per task, used to detect changes
//! - **Read markers**: Durable set of notification ids the viewer has read
//! - **Alerts**: Transient toasts raised only for genuinely new events
//! - **Surface**: The notification list, unread badge and mark-read actions
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `config.toml`
//! - `error`: Error types and result aliases
//! - `task` / `task_store`: Task model, source trait and the file-backed source
//! - `reconciler`: One reconciliation tick and the state it carries
//! - `poller`: Timer-driven ticking on tokio
//! - `surface`: Read-side API over a shared reconciler
//! - `storage` / `lock`: Data directory layout, file locking and atomic writes

pub mod activity;
pub mod alert;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod lock;
pub mod notification;
pub mod output;
pub mod poller;
pub mod read_markers;
pub mod reconciler;
pub mod snapshot;
pub mod storage;
pub mod surface;
pub mod task;
pub mod task_store;

pub use error::{Error, Result};
