//! Transient alerts for newly observed notification events.
//!
//! The reconciler decides *whether* to alert; presenters only decide *how*.
//! Presenters return errors instead of panicking, and the reconciler logs
//! and drops them.
//!
//! # Rule table
//!
//! | kind          | new status  | tone     | ttl            |
//! |---------------|-------------|----------|----------------|
//! | assignment    | any         | info     | assignment ttl |
//! | status_change | completed   | success  | completed ttl  |
//! | status_change | in_progress | progress | status ttl     |
//! | status_change | cancelled   | warning  | status ttl     |
//! | status_change | pending     | muted    | status ttl     |

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use crossterm::style::{Attribute, Color, ContentStyle, StyledContent};
use serde::Serialize;

use crate::clock::Clock;
use crate::config::AlertsConfig;
use crate::error::{Error, Result};
use crate::notification::{NotificationEvent, NotificationKind};
use crate::task::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTone {
    Info,
    Progress,
    Success,
    Warning,
    Muted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertStyle {
    pub tone: AlertTone,
    pub icon: &'static str,
    pub ttl: Duration,
    /// Rendered with the most prominent treatment
    pub emphasized: bool,
}

/// Resolved auto-dismiss durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertRules {
    pub assignment_ttl: Duration,
    pub status_ttl: Duration,
    pub completed_ttl: Duration,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            assignment_ttl: Duration::seconds(6),
            status_ttl: Duration::seconds(5),
            completed_ttl: Duration::seconds(8),
        }
    }
}

impl AlertRules {
    pub fn from_config(config: &AlertsConfig) -> Result<Self> {
        Ok(Self {
            assignment_ttl: config.assignment_ttl()?,
            status_ttl: config.status_ttl()?,
            completed_ttl: config.completed_ttl()?,
        })
    }

    pub fn style_for(&self, event: &NotificationEvent) -> AlertStyle {
        match (event.kind, event.new_status) {
            (NotificationKind::Assignment, _) => AlertStyle {
                tone: AlertTone::Info,
                icon: "📋",
                ttl: self.assignment_ttl,
                emphasized: false,
            },
            (NotificationKind::StatusChange, Some(TaskStatus::Completed)) => AlertStyle {
                tone: AlertTone::Success,
                icon: "✅",
                ttl: self.completed_ttl,
                emphasized: true,
            },
            (NotificationKind::StatusChange, Some(TaskStatus::InProgress)) => AlertStyle {
                tone: AlertTone::Progress,
                icon: "🔄",
                ttl: self.status_ttl,
                emphasized: false,
            },
            (NotificationKind::StatusChange, Some(TaskStatus::Cancelled)) => AlertStyle {
                tone: AlertTone::Warning,
                icon: "⛔",
                ttl: self.status_ttl,
                emphasized: false,
            },
            (NotificationKind::StatusChange, Some(TaskStatus::Pending) | None) => AlertStyle {
                tone: AlertTone::Muted,
                icon: "⏳",
                ttl: self.status_ttl,
                emphasized: false,
            },
        }
    }
}

/// A rendered alert with its expiry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub event_id: String,
    pub kind: NotificationKind,
    pub tone: AlertTone,
    pub icon: &'static str,
    pub headline: String,
    pub message: String,
    pub shown_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub emphasized: bool,
}

impl Alert {
    pub fn from_event(event: &NotificationEvent, rules: &AlertRules, now: DateTime<Utc>) -> Self {
        let style = rules.style_for(event);
        let headline = match (event.kind, event.new_status) {
            (NotificationKind::Assignment, _) => "New task assigned".to_string(),
            (NotificationKind::StatusChange, Some(TaskStatus::Completed)) => {
                "Task completed".to_string()
            }
            (NotificationKind::StatusChange, _) => "Task status changed".to_string(),
        };
        Self {
            event_id: event.id.clone(),
            kind: event.kind,
            tone: style.tone,
            icon: style.icon,
            headline,
            message: event.summary(),
            shown_at: now,
            expires_at: now + style.ttl,
            emphasized: style.emphasized,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Alerts currently on screen; expired ones drop off.
#[derive(Debug, Default)]
pub struct AlertBoard {
    alerts: Mutex<Vec<Alert>>,
}

impl AlertBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn show(&self, alert: Alert) {
        let now = alert.shown_at;
        let mut alerts = self.alerts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        alerts.retain(|existing| !existing.is_expired(now));
        alerts.push(alert);
    }

    /// Alerts still visible at `now`, pruning the rest.
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let mut alerts = self.alerts.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        alerts.retain(|existing| !existing.is_expired(now));
        alerts.clone()
    }
}

/// Side-effecting alert sink.
pub trait AlertPresenter: Send + Sync {
    fn present(&self, event: &NotificationEvent) -> Result<()>;
}

// =============================================================================
// Terminal presenter
// =============================================================================

/// Styled one-line alerts on a terminal stream.
pub struct TerminalPresenter {
    writer: Mutex<Box<dyn Write + Send>>,
    rules: AlertRules,
    clock: Arc<dyn Clock>,
    board: AlertBoard,
}

impl TerminalPresenter {
    pub fn stderr(rules: AlertRules, clock: Arc<dyn Clock>) -> Self {
        Self::with_writer(Box::new(std::io::stderr()), rules, clock)
    }

    pub fn with_writer(writer: Box<dyn Write + Send>, rules: AlertRules, clock: Arc<dyn Clock>) -> Self {
        Self {
            writer: Mutex::new(writer),
            rules,
            clock,
            board: AlertBoard::new(),
        }
    }

    pub fn board(&self) -> &AlertBoard {
        &self.board
    }

    fn color(tone: AlertTone) -> Color {
        match tone {
            AlertTone::Info => Color::Cyan,
            AlertTone::Progress => Color::Blue,
            AlertTone::Success => Color::Green,
            AlertTone::Warning => Color::Red,
            AlertTone::Muted => Color::DarkGrey,
        }
    }
}

impl AlertPresenter for TerminalPresenter {
    fn present(&self, event: &NotificationEvent) -> Result<()> {
        let alert = Alert::from_event(event, &self.rules, self.clock.now());

        let mut style = ContentStyle::new();
        style.foreground_color = Some(Self::color(alert.tone));
        if alert.emphasized {
            style.attributes.set(Attribute::Bold);
        }
        let line = format!("{} {}: {}", alert.icon, alert.headline, alert.message);

        {
            let mut writer = self
                .writer
                .lock()
                .map_err(|_| Error::Presenter("terminal writer poisoned".to_string()))?;
            writeln!(writer, "{}", StyledContent::new(style, line))
                .and_then(|_| writer.flush())
                .map_err(|err| Error::Presenter(err.to_string()))?;
        }

        self.board.show(alert);
        Ok(())
    }
}

// =============================================================================
// JSON lines presenter
// =============================================================================

/// Alerts as JSON lines, one object per alert.
pub struct JsonlPresenter {
    writer: Mutex<Box<dyn Write + Send>>,
    rules: AlertRules,
    clock: Arc<dyn Clock>,
}

impl JsonlPresenter {
    pub fn stdout(rules: AlertRules, clock: Arc<dyn Clock>) -> Self {
        Self::with_writer(Box::new(std::io::stdout()), rules, clock)
    }

    /// Append to a file, creating it if necessary.
    pub fn file(path: &Path, rules: AlertRules, clock: Arc<dyn Clock>) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self::with_writer(Box::new(file), rules, clock))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>, rules: AlertRules, clock: Arc<dyn Clock>) -> Self {
        Self {
            writer: Mutex::new(writer),
            rules,
            clock,
        }
    }
}

impl AlertPresenter for JsonlPresenter {
    fn present(&self, event: &NotificationEvent) -> Result<()> {
        let alert = Alert::from_event(event, &self.rules, self.clock.now());
        let serialized = serde_json::to_vec(&alert)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::Presenter("jsonl writer poisoned".to_string()))?;
        writer
            .write_all(&serialized)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush())
            .map_err(|err| Error::Presenter(err.to_string()))
    }
}

// =============================================================================
// Recording presenter
// =============================================================================

/// Keeps presented alerts in memory. Can be told to fail.
#[derive(Clone)]
pub struct RecordingPresenter {
    alerts: Arc<Mutex<Vec<Alert>>>,
    failing: Arc<Mutex<bool>>,
    rules: AlertRules,
    clock: Arc<dyn Clock>,
}

impl RecordingPresenter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            alerts: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(false)),
            rules: AlertRules::default(),
            clock,
        }
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = failing;
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn event_ids(&self) -> Vec<String> {
        self.alerts().into_iter().map(|alert| alert.event_id).collect()
    }
}

impl AlertPresenter for RecordingPresenter {
    fn present(&self, event: &NotificationEvent) -> Result<()> {
        if *self.failing.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) {
            return Err(Error::Presenter("recording presenter set to fail".to_string()));
        }
        let alert = Alert::from_event(event, &self.rules, self.clock.now());
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(alert);
        Ok(())
    }
}
