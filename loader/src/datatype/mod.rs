//! CSVW datatypes: reading, validating and writing atomic cell values.
//!
//! A [`Datatype`] is built once from a column's `datatype` annotation, either
//! a bare base name (`"integer"`) or an object with a `base` and constraints:
//!
//! ```json
//! {"base": "decimal", "minimum": -2.2, "maxExclusive": "100"}
//! {"base": "boolean", "format": "yes|no"}
//! {"base": "date", "format": "dd.MM.yyyy"}
//! ```
//!
//! Everything derived from the annotation (compiled regex, boolean tokens,
//! date layout, typed bounds) is computed at construction, so parsing a cell
//! never re-reads the JSON.

mod temporal;
mod value;

use std::cmp::Ordering;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde_json::{Map, Value as Json};

use crate::error::{ConstructionError, ConstructionResult, ValueError, ValueResult};

pub use temporal::{Layout, Temporal, TemporalKind};
pub use value::{Cell, StorageKind, StorageValue, Value};

// =============================================================================
// Kinds
// =============================================================================

/// True and false spellings of a boolean column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanTokens {
    truthy: Vec<String>,
    falsy: Vec<String>,
}

impl Default for BooleanTokens {
    fn default() -> Self {
        Self {
            truthy: vec!["true".into(), "1".into()],
            falsy: vec!["false".into(), "0".into()],
        }
    }
}

impl BooleanTokens {
    fn from_format(format: &str) -> Option<Self> {
        let (yes, no) = format.split_once('|')?;
        if no.contains('|') {
            return None;
        }
        Some(Self {
            truthy: vec![yes.to_string()],
            falsy: vec![no.to_string()],
        })
    }

    fn parse(&self, text: &str) -> Option<bool> {
        if self.truthy.iter().any(|t| t == text) {
            Some(true)
        } else if self.falsy.iter().any(|t| t == text) {
            Some(false)
        } else {
            None
        }
    }

    fn format(&self, value: bool) -> &str {
        let tokens = if value { &self.truthy } else { &self.falsy };
        tokens.first().map(String::as_str).unwrap_or_default()
    }
}

/// Value range constraints, typed like the values they bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds<T> {
    pub min_inclusive: Option<T>,
    pub max_inclusive: Option<T>,
    pub min_exclusive: Option<T>,
    pub max_exclusive: Option<T>,
}

impl<T> Default for Bounds<T> {
    fn default() -> Self {
        Self {
            min_inclusive: None,
            max_inclusive: None,
            min_exclusive: None,
            max_exclusive: None,
        }
    }
}

impl<T> Bounds<T> {
    fn check(&self, value: &T, text: &str, cmp: impl Fn(&T, &T) -> Ordering) -> ValueResult<()> {
        if let Some(min) = &self.min_inclusive {
            if cmp(value, min) == Ordering::Less {
                return Err(ValueError::violation(text, "minInclusive"));
            }
        }
        if let Some(max) = &self.max_inclusive {
            if cmp(value, max) == Ordering::Greater {
                return Err(ValueError::violation(text, "maxInclusive"));
            }
        }
        if let Some(min) = &self.min_exclusive {
            if cmp(value, min) != Ordering::Greater {
                return Err(ValueError::violation(text, "minExclusive"));
            }
        }
        if let Some(max) = &self.max_exclusive {
            if cmp(value, max) != Ordering::Less {
                return Err(ValueError::violation(text, "maxExclusive"));
            }
        }
        Ok(())
    }

    /// `(operator, bound)` pairs for SQL CHECK clauses.
    fn comparisons(&self) -> Vec<(&'static str, &T)> {
        let mut res = Vec::new();
        if let Some(v) = &self.min_inclusive {
            res.push((">=", v));
        }
        if let Some(v) = &self.min_exclusive {
            res.push((">", v));
        }
        if let Some(v) = &self.max_inclusive {
            res.push(("<=", v));
        }
        if let Some(v) = &self.max_exclusive {
            res.push(("<", v));
        }
        res
    }
}

/// Base kind with whatever was derived from the annotation.
#[derive(Debug, Clone)]
pub enum Kind {
    String { pattern: Option<Regex> },
    Boolean { tokens: BooleanTokens },
    Integer { bounds: Bounds<i64> },
    Decimal { bounds: Bounds<f64> },
    Temporal {
        kind: TemporalKind,
        layout: Layout,
        bounds: Bounds<Temporal>,
    },
    AnyUri,
    Json,
    Binary,
}

// =============================================================================
// Datatype
// =============================================================================

/// A column datatype.
#[derive(Debug, Clone)]
pub struct Datatype {
    base: String,
    kind: Kind,
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl Datatype {
    /// Build a datatype from the `datatype` annotation of a column, if any.
    pub fn new(description: Option<&Json>) -> ConstructionResult<Self> {
        let empty = Map::new();
        let (base, props) = match description {
            None => ("string".to_string(), &empty),
            Some(Json::String(base)) => (base.clone(), &empty),
            Some(Json::Object(props)) => {
                let base = match props.get("base") {
                    None => "string".to_string(),
                    Some(Json::String(base)) => base.clone(),
                    Some(other) => {
                        return Err(ConstructionError::invalid(
                            "base",
                            format!("expected a string, got {}", other),
                        ))
                    }
                };
                (base, props)
            }
            Some(other) => {
                return Err(ConstructionError::invalid(
                    "datatype",
                    format!("expected a string or an object, got {}", other),
                ))
            }
        };

        let length = length_property(props, "length")?;
        let min_length = length_property(props, "minLength")?;
        let max_length = length_property(props, "maxLength")?;
        let bounds = BoundTexts::read(props)?;
        let format = props.get("format");

        let kind = match base.as_str() {
            "string" | "normalizedString" | "token" => {
                bounds.reject(&base)?;
                let pattern = match format {
                    None => None,
                    Some(Json::String(f)) => Some(anchored_regex(f)?),
                    Some(_) => {
                        return Err(ConstructionError::invalid("format", "must be a string"))
                    }
                };
                Kind::String { pattern }
            }
            "boolean" => {
                bounds.reject(&base)?;
                let tokens = match format {
                    None => BooleanTokens::default(),
                    Some(Json::String(f)) => BooleanTokens::from_format(f).ok_or_else(|| {
                        ConstructionError::invalid("format", format!("expected 'true|false' form, got '{}'", f))
                    })?,
                    Some(_) => {
                        return Err(ConstructionError::invalid("format", "must be a string"))
                    }
                };
                Kind::Boolean { tokens }
            }
            "integer" | "int" | "long" => Kind::Integer {
                bounds: bounds.convert(&base, |s| s.parse::<i64>().ok())?,
            },
            "decimal" | "float" | "double" | "number" => Kind::Decimal {
                bounds: bounds.convert(&base, parse_decimal)?,
            },
            "date" | "time" | "datetime" | "dateTime" | "dateTimeStamp" => {
                let kind = match base.as_str() {
                    "date" => TemporalKind::Date,
                    "time" => TemporalKind::Time,
                    "dateTimeStamp" => TemporalKind::DateTimeStamp,
                    _ => TemporalKind::DateTime,
                };
                let layout = temporal_layout(&base, kind, format)?;
                let bounds = bounds.convert(&base, |s| layout.parse(s))?;
                Kind::Temporal { kind, layout, bounds }
            }
            "anyURI" => {
                bounds.reject(&base)?;
                Kind::AnyUri
            }
            "json" => {
                bounds.reject(&base)?;
                Kind::Json
            }
            "binary" | "base64Binary" => {
                bounds.reject(&base)?;
                Kind::Binary
            }
            _ => return Err(ConstructionError::UnsupportedBase(base)),
        };

        Ok(Self {
            base,
            kind,
            length,
            min_length,
            max_length,
        })
    }

    /// Shorthand for a datatype given by base name only.
    pub fn from_base(base: &str) -> ConstructionResult<Self> {
        Self::new(Some(&Json::String(base.to_string())))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn length(&self) -> Option<usize> {
        self.length
    }

    pub fn min_length(&self) -> Option<usize> {
        self.min_length
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Read a value. With `enforce` off, length, range and pattern
    /// constraints are skipped but the text must still be well-formed.
    pub fn parse(&self, text: &str, enforce: bool) -> ValueResult<Value> {
        let value = match &self.kind {
            Kind::String { pattern } => {
                if enforce {
                    self.check_length(text, text.len())?;
                    if let Some(pattern) = pattern {
                        if !pattern.is_match(text) {
                            return Err(ValueError::violation(
                                text,
                                format!("format {}", pattern.as_str()),
                            ));
                        }
                    }
                }
                Value::String(text.to_string())
            }
            Kind::Boolean { tokens } => {
                Value::Boolean(tokens.parse(text).ok_or_else(|| self.invalid(text))?)
            }
            Kind::Integer { bounds } => {
                let v: i64 = text.parse().map_err(|_| self.invalid(text))?;
                if enforce {
                    bounds.check(&v, text, i64::cmp)?;
                }
                Value::Integer(v)
            }
            Kind::Decimal { bounds } => {
                let v = parse_decimal(text).ok_or_else(|| self.invalid(text))?;
                if enforce {
                    bounds.check(&v, text, f64::total_cmp)?;
                }
                Value::Decimal(v)
            }
            Kind::Temporal { layout, bounds, .. } => {
                let v = layout.parse(text).ok_or_else(|| self.invalid(text))?;
                if enforce {
                    bounds.check(&v, text, Temporal::cmp_instant)?;
                }
                Value::Temporal(v)
            }
            Kind::AnyUri => Value::Uri(url::Url::parse(text).map_err(|_| self.invalid(text))?),
            Kind::Json => Value::Json(serde_json::from_str(text).map_err(|_| self.invalid(text))?),
            Kind::Binary => {
                let bytes = STANDARD.decode(text).map_err(|_| self.invalid(text))?;
                if enforce {
                    self.check_length(text, bytes.len())?;
                }
                Value::Binary(bytes)
            }
        };
        Ok(value)
    }

    /// Write a value so that [`Datatype::parse`] reads it back unchanged.
    pub fn format(&self, value: &Value) -> ValueResult<String> {
        match (&self.kind, value) {
            (Kind::String { .. }, Value::String(s)) => Ok(s.clone()),
            (Kind::Boolean { tokens }, Value::Boolean(b)) => Ok(tokens.format(*b).to_string()),
            (Kind::Integer { .. }, Value::Integer(i)) => Ok(i.to_string()),
            (Kind::Decimal { .. }, Value::Decimal(f)) => Ok(f.to_string()),
            (Kind::Temporal { layout, .. }, Value::Temporal(t)) => Ok(layout.format(t)),
            (Kind::AnyUri, Value::Uri(u)) => Ok(u.to_string()),
            (Kind::Json, Value::Json(j)) => Ok(j.to_string()),
            (Kind::Binary, Value::Binary(b)) => Ok(STANDARD.encode(b)),
            (_, other) => Err(ValueError::invalid(self.base.clone(), format!("<{}>", other.kind_name()))),
        }
    }

    /// Convert a value for binding to an SQL parameter.
    pub fn to_storage(&self, value: Option<&Value>) -> StorageValue {
        let Some(value) = value else {
            return StorageValue::Null;
        };
        match value {
            Value::Boolean(b) => StorageValue::Integer(i64::from(*b)),
            Value::Integer(i) => StorageValue::Integer(*i),
            Value::Decimal(f) => StorageValue::Real(*f),
            Value::String(s) => StorageValue::Text(s.clone()),
            Value::Uri(u) => StorageValue::Text(u.to_string()),
            Value::Json(j) => StorageValue::Text(j.to_string()),
            Value::Binary(b) => StorageValue::Text(STANDARD.encode(b)),
            Value::Temporal(t) => StorageValue::Text(match &self.kind {
                Kind::Temporal { layout, .. } => layout.format(t),
                _ => t.datetime.to_string(),
            }),
        }
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self.kind {
            Kind::Boolean { .. } | Kind::Integer { .. } => StorageKind::Integer,
            Kind::Decimal { .. } => StorageKind::Real,
            _ => StorageKind::Text,
        }
    }

    /// Boolean SQL expressions mirroring the length and range constraints.
    /// Temporal bounds are left to [`Datatype::parse`]: stored date text does
    /// not sort like the instants it denotes.
    pub fn sql_constraints(&self, column: &str) -> Vec<String> {
        let mut checks: Vec<String> = match &self.kind {
            Kind::Integer { bounds } => bounds
                .comparisons()
                .into_iter()
                .map(|(op, v)| format!("`{}` {} {}", column, op, v))
                .collect(),
            Kind::Decimal { bounds } => bounds
                .comparisons()
                .into_iter()
                .map(|(op, v)| format!("`{}` {} {}", column, op, v))
                .collect(),
            _ => Vec::new(),
        };
        if matches!(self.kind, Kind::String { .. }) {
            if let Some(n) = self.length {
                checks.push(format!("{} = {}", byte_length(column), n));
            }
            if let Some(n) = self.min_length {
                checks.push(format!("{} >= {}", byte_length(column), n));
            }
            if let Some(n) = self.max_length {
                checks.push(format!("{} <= {}", byte_length(column), n));
            }
        }
        checks
    }

    fn check_length(&self, text: &str, len: usize) -> ValueResult<()> {
        if self.length.is_some_and(|n| len != n) {
            return Err(ValueError::violation(text, "length"));
        }
        if self.min_length.is_some_and(|n| len < n) {
            return Err(ValueError::violation(text, "minLength"));
        }
        if self.max_length.is_some_and(|n| len > n) {
            return Err(ValueError::violation(text, "maxLength"));
        }
        Ok(())
    }

    fn invalid(&self, text: &str) -> ValueError {
        ValueError::invalid(self.base.clone(), text)
    }
}

// =============================================================================
// Annotation helpers
// =============================================================================

fn anchored_regex(format: &str) -> ConstructionResult<Regex> {
    let mut pattern = String::with_capacity(format.len() + 2);
    if !format.starts_with('^') {
        pattern.push('^');
    }
    pattern.push_str(format);
    if !format.ends_with('$') {
        pattern.push('$');
    }
    Ok(Regex::new(&pattern)?)
}

/// Finite decimals only. `inf` and `NaN` have no SQL literal and do not round-trip.
fn parse_decimal(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// SQLite `length()` of a TEXT value counts characters; lengths here are bytes.
fn byte_length(column: &str) -> String {
    format!("length(CAST(`{}` AS BLOB))", column)
}

fn temporal_layout(base: &str, kind: TemporalKind, format: Option<&Json>) -> ConstructionResult<Layout> {
    let pattern = match format {
        None => kind.default_pattern(),
        Some(Json::String(f)) => f.as_str(),
        Some(_) => return Err(ConstructionError::invalid("format", "must be a string")),
    };
    let layout = kind
        .layout(pattern)
        .ok_or_else(|| ConstructionError::UnsupportedFormat {
            base: base.to_string(),
            format: pattern.to_string(),
        })?;
    if kind == TemporalKind::DateTimeStamp && !layout.has_zone() {
        return Err(ConstructionError::invalid(
            "format",
            format!("{} requires a timezone, '{}' has none", base, pattern),
        ));
    }
    Ok(layout)
}

/// Read a non-negative integer property. Present but non-numeric is an error.
fn length_property(props: &Map<String, Json>, key: &str) -> ConstructionResult<Option<usize>> {
    match props.get(key) {
        None => Ok(None),
        Some(Json::Number(n)) => n
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| ConstructionError::invalid(key, format!("expected a non-negative integer, got {}", n))),
        Some(other) => Err(ConstructionError::invalid(
            key,
            format!("expected an integer, got {}", other),
        )),
    }
}

/// Range bounds as written in the annotation, before conversion to the base kind.
#[derive(Debug, Default)]
struct BoundTexts {
    min_inclusive: Option<String>,
    max_inclusive: Option<String>,
    min_exclusive: Option<String>,
    max_exclusive: Option<String>,
}

impl BoundTexts {
    fn read(props: &Map<String, Json>) -> ConstructionResult<Self> {
        let mut res = Self {
            min_inclusive: bound_property(props, "minInclusive")?,
            max_inclusive: bound_property(props, "maxInclusive")?,
            min_exclusive: bound_property(props, "minExclusive")?,
            max_exclusive: bound_property(props, "maxExclusive")?,
        };
        if res.min_inclusive.is_none() {
            res.min_inclusive = bound_property(props, "minimum")?;
        }
        if res.max_inclusive.is_none() {
            res.max_inclusive = bound_property(props, "maximum")?;
        }
        Ok(res)
    }

    fn is_empty(&self) -> bool {
        self.min_inclusive.is_none()
            && self.max_inclusive.is_none()
            && self.min_exclusive.is_none()
            && self.max_exclusive.is_none()
    }

    fn reject(&self, base: &str) -> ConstructionResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ConstructionError::invalid(
                "minimum/maximum",
                format!("{} values have no order", base),
            ))
        }
    }

    fn convert<T>(self, base: &str, parse: impl Fn(&str) -> Option<T>) -> ConstructionResult<Bounds<T>> {
        let one = |name: &str, text: Option<String>| -> ConstructionResult<Option<T>> {
            match text {
                None => Ok(None),
                Some(text) => parse(&text).map(Some).ok_or_else(|| {
                    ConstructionError::invalid(name, format!("'{}' is not a valid {} value", text, base))
                }),
            }
        };
        Ok(Bounds {
            min_inclusive: one("minInclusive", self.min_inclusive)?,
            max_inclusive: one("maxInclusive", self.max_inclusive)?,
            min_exclusive: one("minExclusive", self.min_exclusive)?,
            max_exclusive: one("maxExclusive", self.max_exclusive)?,
        })
    }
}

/// Read a bound given as JSON string or number. `null` is an error.
fn bound_property(props: &Map<String, Json>, key: &str) -> ConstructionResult<Option<String>> {
    match props.get(key) {
        None => Ok(None),
        Some(Json::String(s)) => Ok(Some(s.clone())),
        Some(Json::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(ConstructionError::invalid(
            key,
            format!("expected a string or number, got {}", other),
        )),
    }
}
