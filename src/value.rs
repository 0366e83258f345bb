//! Typed OSC arguments

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single typed argument of an OSC message
///
/// The variant alone decides how the argument is framed on the wire, see
/// [`crate::codec`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum OscArg {
    /// Signed integer (`i`, or `h` outside the 32-bit range)
    Int(i64),
    /// Floating point number (`f`)
    Float(f64),
    /// Text (`s`)
    String(String),
    /// Type-only marker (`T` / `F`)
    Bool(bool),
}

impl OscArg {
    /// OSC type tag this argument is encoded with
    pub fn type_tag(&self) -> char {
        match self {
            OscArg::Int(v) if i32::try_from(*v).is_ok() => 'i',
            OscArg::Int(_) => 'h',
            OscArg::Float(_) => 'f',
            OscArg::String(_) => 's',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Int(v) => write!(f, "{}", v),
            OscArg::Float(v) => write!(f, "{}", v),
            OscArg::String(s) => write!(f, "\"{}\"", s),
            OscArg::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for OscArg {
    fn from(v: i64) -> Self {
        OscArg::Int(v)
    }
}

impl From<f64> for OscArg {
    fn from(v: f64) -> Self {
        OscArg::Float(v)
    }
}

impl From<&str> for OscArg {
    fn from(s: &str) -> Self {
        OscArg::String(s.to_string())
    }
}

impl From<String> for OscArg {
    fn from(s: String) -> Self {
        OscArg::String(s)
    }
}

impl From<bool> for OscArg {
    fn from(v: bool) -> Self {
        OscArg::Bool(v)
    }
}

/// JSON shape of an explicitly typed argument, e.g. `{"type":"f","value":0.5}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum ArgLiteral {
    #[serde(rename = "i", alias = "h")]
    Int { value: i64 },
    #[serde(rename = "f", alias = "d")]
    Float { value: f64 },
    #[serde(rename = "s")]
    String { value: String },
    #[serde(rename = "T")]
    True,
    #[serde(rename = "F")]
    False,
}

impl ArgLiteral {
    pub(crate) fn into_arg(self) -> OscArg {
        match self {
            ArgLiteral::Int { value } => OscArg::Int(value),
            ArgLiteral::Float { value } => OscArg::Float(value),
            ArgLiteral::String { value } => OscArg::String(value),
            ArgLiteral::True => OscArg::Bool(true),
            ArgLiteral::False => OscArg::Bool(false),
        }
    }
}

/// Parse a finite decimal number; `inf`/`nan` spellings are not numbers here
pub fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an integer, truncating any fractional or exponent part
///
/// `"12"` → 12, `"12.9"` → 12, `"-1e3"` → -1000. Values beyond the i64
/// range saturate.
pub fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Some(v);
    }
    // `as` saturates for out-of-range floats
    parse_float(text).map(|v| v.trunc() as i64)
}
