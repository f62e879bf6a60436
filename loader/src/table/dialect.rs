//! CSV dialect descriptions.
//!
//! Supported annotations:
//!
//! - `delimiter` - one ASCII character, default `,`
//! - `commentPrefix` - one ASCII character, lines starting with it are skipped
//! - `header` - whether the first row holds column titles, default `true`
//! - `trim` - `true`, `false`, `"start"` or `"end"`
//! - `skipInitialSpace` - same as `trim: "start"` unless `trim` is given

use serde_json::Value;

use crate::error::{ConstructionError, ConstructionResult};

/// Which side of a field to strip whitespace from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trim {
    #[default]
    None,
    Both,
    Start,
    End,
}

impl Trim {
    pub fn apply<'a>(&self, field: &'a str) -> &'a str {
        match self {
            Trim::None => field,
            Trim::Both => field.trim(),
            Trim::Start => field.trim_start(),
            Trim::End => field.trim_end(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub comment_prefix: Option<u8>,
    pub header: bool,
    pub trim: Trim,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            comment_prefix: None,
            header: true,
            trim: Trim::None,
        }
    }
}

impl Dialect {
    /// Build a dialect from a `dialect` annotation. A missing annotation gives the default.
    pub fn from_json(description: Option<&Value>) -> ConstructionResult<Self> {
        let mut res = Self::default();
        let props = match description {
            None => return Ok(res),
            Some(Value::Object(props)) => props,
            Some(other) => {
                return Err(ConstructionError::invalid(
                    "dialect",
                    format!("expected an object, got {}", other),
                ))
            }
        };

        if let Some(delimiter) = ascii_char(props.get("delimiter"), "delimiter")? {
            res.delimiter = delimiter;
        }
        res.comment_prefix = ascii_char(props.get("commentPrefix"), "commentPrefix")?;
        res.header = match props.get("header") {
            None => true,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(ConstructionError::invalid(
                    "header",
                    format!("expected a boolean, got {}", other),
                ))
            }
        };
        let skip_initial_space = match props.get("skipInitialSpace") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(ConstructionError::invalid(
                    "skipInitialSpace",
                    format!("expected a boolean, got {}", other),
                ))
            }
        };
        res.trim = match props.get("trim") {
            Some(Value::Bool(true)) => Trim::Both,
            Some(Value::Bool(false)) => Trim::None,
            Some(Value::String(s)) => match s.as_str() {
                "true" => Trim::Both,
                "false" => Trim::None,
                "start" => Trim::Start,
                "end" => Trim::End,
                _ => return Err(ConstructionError::invalid("trim", format!("invalid value '{}'", s))),
            },
            Some(other) => {
                return Err(ConstructionError::invalid("trim", format!("invalid value {}", other)))
            }
            None if skip_initial_space => Trim::Start,
            None => Trim::None,
        };
        Ok(res)
    }
}

fn ascii_char(value: Option<&Value>, key: &str) -> ConstructionResult<Option<u8>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.len() == 1 && s.is_ascii() => Ok(Some(s.as_bytes()[0])),
        Some(other) => Err(ConstructionError::invalid(
            key,
            format!("expected a single ASCII character, got {}", other),
        )),
    }
}
