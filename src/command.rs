//! Commands: loosely-typed requests and their validated form
//!
//! A [`CommandRequest`] carries the options of one action exactly as a user
//! typed them (text, possibly containing `$(variables)`). Resolving it runs
//! every text field through a [`VariableResolver`] and parses numeric fields
//! strictly, producing a [`Command`] that can no longer fail.

use crate::args::tokenize;
use crate::ramp::{plan_float_ramp, plan_integer_ramp, RampPlan};
use crate::value::{parse_float, parse_integer, OscArg};
use crate::OscError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default OSC address of every action
pub const DEFAULT_PATH: &str = "/osc/path";

/// Default fade time in milliseconds
pub const DEFAULT_FADE_MS: &str = "1000";

/// Default float fade granularity
pub const DEFAULT_GRANULARITY: &str = "2";

/// Default arguments of the multiple-arguments action
pub const DEFAULT_ARGUMENTS: &str = r#"1 "test" 2.5"#;

/// Substitutes variables in user text before it is parsed
pub trait VariableResolver: Send + Sync {
    fn resolve(&self, text: &str) -> String;
}

/// Leaves text untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariables;

impl VariableResolver for NoVariables {
    fn resolve(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Replaces `$(name)` with a fixed value; unknown names are left as written
#[derive(Debug, Clone, Default)]
pub struct StaticVariables {
    values: HashMap<String, String>,
}

impl StaticVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Parse a `name=value` assignment
    pub fn parse_assignment(assignment: &str) -> Result<(String, String), OscError> {
        match assignment.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), value.to_string()))
            }
            _ => Err(OscError::InvalidConfig(format!(
                "Expected name=value, got '{}'",
                assignment
            ))),
        }
    }
}

impl FromIterator<(String, String)> for StaticVariables {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl VariableResolver for StaticVariables {
    fn resolve(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find("$(") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            match after.find(')') {
                Some(close) => {
                    let name = &after[..close];
                    match self.values.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            debug!("Unknown variable $({})", name);
                            out.push_str(&rest[open..open + 2 + close + 1]);
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// Options shared by every action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathOptions {
    pub path: String,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
        }
    }
}

/// Options of the send-integer action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntOptions {
    pub path: String,
    pub enable_fade: bool,
    /// Value sent when not fading
    pub int: String,
    pub start: String,
    pub end: String,
    /// Fade time in milliseconds
    pub fade: String,
}

impl Default for IntOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            enable_fade: false,
            int: "1".to_string(),
            start: String::new(),
            end: String::new(),
            fade: DEFAULT_FADE_MS.to_string(),
        }
    }
}

/// Options of the send-float action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatOptions {
    pub path: String,
    pub enable_fade: bool,
    /// Value sent when not fading
    pub float: String,
    pub start: String,
    pub end: String,
    /// Fade time in milliseconds
    pub fade: String,
    /// Decimal digits per fade step (0-4)
    pub granularity: String,
}

impl Default for FloatOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            enable_fade: false,
            float: "1".to_string(),
            start: String::new(),
            end: String::new(),
            fade: DEFAULT_FADE_MS.to_string(),
            granularity: DEFAULT_GRANULARITY.to_string(),
        }
    }
}

/// Options of the send-string action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringOptions {
    pub path: String,
    pub string: String,
}

impl Default for StringOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            string: "text".to_string(),
        }
    }
}

/// Options of the send-multiple action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipleOptions {
    pub path: String,
    pub arguments: String,
}

impl Default for MultipleOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            arguments: DEFAULT_ARGUMENTS.to_string(),
        }
    }
}

/// Options of the send-boolean action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoolOptions {
    pub path: String,
    pub value: bool,
}

impl Default for BoolOptions {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            value: false,
        }
    }
}

/// One action as requested, before variables and numbers are resolved
///
/// Deserializes from e.g. `{"action": "send_int", "path": "/vol", "int": "3"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommandRequest {
    SendBlank(PathOptions),
    SendInt(IntOptions),
    SendFloat(FloatOptions),
    SendString(StringOptions),
    SendMultiple(MultipleOptions),
    SendBoolean(BoolOptions),
}

/// What a resolved command sends
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Blank,
    Int(i64),
    IntFade {
        start: i64,
        end: i64,
        duration_ms: i64,
    },
    Float(f64),
    FloatFade {
        start: f64,
        end: f64,
        duration_ms: i64,
        granularity: u32,
    },
    String(String),
    Multiple(Vec<OscArg>),
    Bool(bool),
}

/// A validated command
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub path: String,
    pub action: Action,
}

/// How a command goes out
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// One message, right away
    Now(Vec<OscArg>),
    /// A timed run of messages
    Fade(RampPlan),
}

impl Command {
    pub fn new(path: impl Into<String>, action: Action) -> Self {
        Self {
            path: path.into(),
            action,
        }
    }

    pub fn plan(&self) -> Dispatch {
        match &self.action {
            Action::Blank => Dispatch::Now(vec![]),
            Action::Int(v) => Dispatch::Now(vec![OscArg::Int(*v)]),
            Action::IntFade {
                start,
                end,
                duration_ms,
            } => Dispatch::Fade(plan_integer_ramp(*start, *end, *duration_ms)),
            Action::Float(v) => Dispatch::Now(vec![OscArg::Float(*v)]),
            Action::FloatFade {
                start,
                end,
                duration_ms,
                granularity,
            } => Dispatch::Fade(plan_float_ramp(*start, *end, *duration_ms, *granularity)),
            Action::String(s) => Dispatch::Now(vec![OscArg::String(s.clone())]),
            Action::Multiple(args) => Dispatch::Now(args.clone()),
            Action::Bool(v) => Dispatch::Now(vec![OscArg::Bool(*v)]),
        }
    }
}

fn resolve_path(vars: &dyn VariableResolver, path: &str) -> Result<String, OscError> {
    let path = vars.resolve(path);
    if path.starts_with('/') {
        Ok(path)
    } else {
        Err(OscError::InvalidPath(path))
    }
}

fn resolve_integer(vars: &dyn VariableResolver, field: &'static str, text: &str) -> Result<i64, OscError> {
    let text = vars.resolve(text);
    parse_integer(&text).ok_or(OscError::InvalidNumeric { field, text })
}

fn resolve_float(vars: &dyn VariableResolver, field: &'static str, text: &str) -> Result<f64, OscError> {
    let text = vars.resolve(text);
    parse_float(&text).ok_or(OscError::InvalidNumeric { field, text })
}

fn resolve_granularity(vars: &dyn VariableResolver, text: &str) -> Result<u32, OscError> {
    let granularity = resolve_integer(vars, "granularity", text)?;
    if granularity < 0 {
        warn!("Granularity {} out of range, using 0", granularity);
    }
    Ok(u32::try_from(granularity.max(0)).unwrap_or(u32::MAX))
}

impl CommandRequest {
    /// Resolve variables and parse numeric options
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the path does not start with `/`
    /// - a numeric option (value, fade bounds, fade time, granularity) is
    ///   not a finite number
    pub fn resolve(&self, vars: &dyn VariableResolver) -> Result<Command, OscError> {
        let command = match self {
            CommandRequest::SendBlank(o) => Command::new(resolve_path(vars, &o.path)?, Action::Blank),
            CommandRequest::SendInt(o) => {
                let path = resolve_path(vars, &o.path)?;
                let action = if o.enable_fade {
                    Action::IntFade {
                        start: resolve_integer(vars, "start", &o.start)?,
                        end: resolve_integer(vars, "end", &o.end)?,
                        duration_ms: resolve_integer(vars, "fade", &o.fade)?,
                    }
                } else {
                    Action::Int(resolve_integer(vars, "int", &o.int)?)
                };
                Command::new(path, action)
            }
            CommandRequest::SendFloat(o) => {
                let path = resolve_path(vars, &o.path)?;
                let action = if o.enable_fade {
                    Action::FloatFade {
                        start: resolve_float(vars, "start", &o.start)?,
                        end: resolve_float(vars, "end", &o.end)?,
                        duration_ms: resolve_integer(vars, "fade", &o.fade)?,
                        granularity: resolve_granularity(vars, &o.granularity)?,
                    }
                } else {
                    Action::Float(resolve_float(vars, "float", &o.float)?)
                };
                Command::new(path, action)
            }
            CommandRequest::SendString(o) => Command::new(
                resolve_path(vars, &o.path)?,
                Action::String(vars.resolve(&o.string)),
            ),
            CommandRequest::SendMultiple(o) => Command::new(
                resolve_path(vars, &o.path)?,
                Action::Multiple(tokenize(&vars.resolve(&o.arguments))),
            ),
            CommandRequest::SendBoolean(o) => {
                Command::new(resolve_path(vars, &o.path)?, Action::Bool(o.value))
            }
        };

        Ok(command)
    }
}
