//! Command output: a `leadline.v1` JSON envelope or a sectioned text report.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

pub const SCHEMA_VERSION: &str = "leadline.v1";

/// Subcommand groups whose name includes the second positional word.
const COMMAND_GROUPS: [&str; 3] = ["task", "notify", "activity"];
/// Global flags that consume the following argument.
const GLOBAL_VALUE_FLAGS: [&str; 2] = ["--data-dir", "--user"];

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Text rendering of a command result. Warnings and next steps also ride
/// along in the JSON envelope.
#[derive(Debug, Clone, Default)]
pub struct HumanOutput {
    title: String,
    facts: Vec<(String, String)>,
    lines: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.facts.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn push_next_step(&mut self, step: impl Into<String>) {
        self.next_steps.push(step.into());
    }
}

impl fmt::Display for HumanOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)?;
        if !self.facts.is_empty() {
            let width = self.facts.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
            writeln!(f)?;
            for (key, value) in &self.facts {
                write!(f, "\n  {key:<width$}  {value}")?;
            }
        }
        for (heading, items) in [
            ("", &self.lines),
            ("warning: ", &self.warnings),
            ("next: ", &self.next_steps),
        ] {
            if items.is_empty() {
                continue;
            }
            writeln!(f)?;
            for item in items {
                write!(f, "\n  {heading}{item}")?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Success,
    Error,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    schema_version: &'static str,
    command: &'a str,
    status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    next_steps: Vec<String>,
}

impl Envelope<'_> {
    fn print(&self) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let (warnings, next_steps) = human
            .map(|human| (human.warnings.clone(), human.next_steps.clone()))
            .unwrap_or_default();
        return Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: Status::Success,
            data: Some(serde_json::to_value(data)?),
            error: None,
            warnings,
            next_steps,
        }
        .print();
    }

    if let Some(human) = human.filter(|_| !options.quiet) {
        println!("{human}");
    }
    Ok(())
}

/// Report a failed command. JSON goes to stdout like any other result; text
/// goes to stderr.
pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    let hint = recovery_hint(err);
    if json {
        return Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: Status::Error,
            data: None,
            error: Some(ErrorBody {
                message: err.to_string(),
                code: err.exit_code(),
                kind: if err.exit_code() == crate::error::exit_codes::USER_ERROR {
                    "user_error"
                } else {
                    "operation_failed"
                },
                details: err.details(),
            }),
            warnings: Vec::new(),
            next_steps: hint.into_iter().map(str::to_string).collect(),
        }
        .print();
    }

    eprintln!("error: {err}");
    if let Some(hint) = hint {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

fn recovery_hint(err: &Error) -> Option<&'static str> {
    match err {
        Error::UserRequired => Some("leadline --user <id> notify poll"),
        Error::TaskNotFound(_) => Some("leadline task list"),
        Error::InvalidConfig(_) => Some("fix config.toml in the data directory then retry"),
        Error::LockFailed(_) => Some("retry; another leadline process holds the lock"),
        _ => None,
    }
}

/// Command name for the error envelope, read before clap parses so that
/// parse failures are still labelled.
pub fn infer_command_name_from_args() -> String {
    command_name(std::env::args().skip(1))
}

fn command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut args = args.into_iter();
    let mut words = Vec::with_capacity(2);
    while let Some(arg) = args.next() {
        if GLOBAL_VALUE_FLAGS.contains(&arg.as_str()) {
            args.next();
        } else if !arg.starts_with('-') {
            words.push(arg);
            let grouped = COMMAND_GROUPS.contains(&words[0].as_str());
            if words.len() == 2 || !grouped {
                break;
            }
        }
    }
    if words.is_empty() {
        "leadline".to_string()
    } else {
        words.join(" ")
    }
}
