//! Date, time and datetime layouts.
//!
//! Formats are given as CSVW/UAX35 patterns such as `dd.MM.yyyy` or
//! `yyyy-MM-ddTHH:mm:ss.SSSXXX`. Only the patterns listed below are
//! recognized; each of them may carry a timezone suffix, either directly or
//! after a single space:
//!
//! | Suffix        | Accepts              | Emits    |
//! |---------------|----------------------|----------|
//! | `X`           | `Z`, `+hh`, `+hhmm`  | `+hhmm`  |
//! | `XX`          | `Z`, `+hhmm`         | `+hhmm`  |
//! | `XXX`         | `Z`, `+hh:mm`        | `+hh:mm` |
//! | `x` / `xx`    | `+hh(mm)` / `+hhmm`  | `+hhmm`  |
//! | `xxx`         | `+hh:mm`             | `+hh:mm` |
//!
//! The `X` family writes a UTC offset as `Z`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Write;

use chrono::format::{Item, Numeric, Pad};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use once_cell::sync::Lazy;

// =============================================================================
// Pattern tables
// =============================================================================

const DATE_PATTERNS: &[&str] = &[
    "yyyy-MM-dd",
    "yyyyMMdd",
    "dd-MM-yyyy",
    "d-M-yyyy",
    "MM-dd-yyyy",
    "M-d-yyyy",
    "dd/MM/yyyy",
    "d/M/yyyy",
    "MM/dd/yyyy",
    "M/d/yyyy",
    "dd.MM.yyyy",
    "d.M.yyyy",
    "MM.dd.yyyy",
    "M.d.yyyy",
];

const TIME_PATTERNS: &[&str] = &[
    "HH:mm:ss.S",
    "HH:mm:ss.SS",
    "HH:mm:ss.SSS",
    "HH:mm:ss",
    "HHmmss",
    "HH:mm",
    "HHmm",
];

const DATETIME_PATTERNS: &[&str] = &[
    "yyyy-MM-ddTHH:mm:ss.S",
    "yyyy-MM-ddTHH:mm:ss.SS",
    "yyyy-MM-ddTHH:mm:ss.SSS",
    "yyyy-MM-ddTHH:mm:ss",
    "yyyy-MM-ddTHH:mm",
];

const ZONE_PATTERNS: &[&str] = &["X", "XX", "XXX", "x", "xx", "xxx"];

static DATE_LAYOUTS: Lazy<HashMap<String, Layout>> =
    Lazy::new(|| with_zones(DATE_PATTERNS.iter().map(|p| p.to_string())));

static TIME_LAYOUTS: Lazy<HashMap<String, Layout>> =
    Lazy::new(|| with_zones(TIME_PATTERNS.iter().map(|p| p.to_string())));

static DATETIME_LAYOUTS: Lazy<HashMap<String, Layout>> = Lazy::new(|| {
    let combined = DATE_PATTERNS
        .iter()
        .flat_map(|d| TIME_PATTERNS.iter().map(move |t| format!("{} {}", d, t)));
    with_zones(DATETIME_PATTERNS.iter().map(|p| p.to_string()).chain(combined))
});

fn with_zones(patterns: impl Iterator<Item = String>) -> HashMap<String, Layout> {
    let mut res = HashMap::new();
    for pattern in patterns {
        for zone in ZONE_PATTERNS {
            for variant in [format!("{}{}", pattern, zone), format!("{} {}", pattern, zone)] {
                if let Some(layout) = Layout::compile(&variant) {
                    res.insert(variant, layout);
                }
            }
        }
        if let Some(layout) = Layout::compile(&pattern) {
            res.insert(pattern, layout);
        }
    }
    res
}

// =============================================================================
// Temporal kinds
// =============================================================================

/// The four temporal datatype bases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    Date,
    Time,
    DateTime,
    /// A datetime that must carry a timezone.
    DateTimeStamp,
}

impl TemporalKind {
    pub fn default_pattern(&self) -> &'static str {
        match self {
            TemporalKind::Date => "yyyy-MM-dd",
            TemporalKind::Time => "HH:mm:ss",
            TemporalKind::DateTime => "yyyy-MM-ddTHH:mm:ss",
            TemporalKind::DateTimeStamp => "yyyy-MM-ddTHH:mm:ssXXX",
        }
    }

    /// Look up a recognized layout for this kind.
    pub fn layout(&self, pattern: &str) -> Option<Layout> {
        let table = match self {
            TemporalKind::Date => &DATE_LAYOUTS,
            TemporalKind::Time => &TIME_LAYOUTS,
            TemporalKind::DateTime | TemporalKind::DateTimeStamp => &DATETIME_LAYOUTS,
        };
        table.get(pattern).cloned()
    }
}

// =============================================================================
// Values
// =============================================================================

/// A parsed date, time or datetime.
///
/// Dates carry midnight, times carry 1970-01-01. The offset is present iff
/// the layout has a timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Temporal {
    pub datetime: NaiveDateTime,
    pub offset: Option<FixedOffset>,
}

impl Temporal {
    /// The value shifted to UTC, or the naive value when no zone is known.
    pub fn instant(&self) -> NaiveDateTime {
        match self.offset {
            Some(offset) => self.datetime - offset,
            None => self.datetime,
        }
    }

    pub fn cmp_instant(&self, other: &Temporal) -> Ordering {
        self.instant().cmp(&other.instant())
    }
}

// =============================================================================
// Layouts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Zone {
    /// `+hh:mm` rather than `+hhmm`
    extended: bool,
    allow_z: bool,
    minutes_optional: bool,
}

impl Zone {
    fn new(letters: usize, allow_z: bool) -> Self {
        Self {
            extended: letters == 3,
            allow_z,
            minutes_optional: letters == 1,
        }
    }

    fn parse(&self, cur: &mut Cursor<'_>) -> Option<FixedOffset> {
        if self.allow_z && cur.eat(b'Z') {
            return FixedOffset::east_opt(0);
        }
        let sign = if cur.eat(b'+') {
            1
        } else if cur.eat(b'-') {
            -1
        } else {
            return None;
        };
        let hours = cur.digits(2, 2)?;
        let minutes = if self.extended {
            if !cur.eat(b':') {
                return None;
            }
            cur.digits(2, 2)?
        } else if self.minutes_optional && !cur.at_digit() {
            0
        } else {
            cur.digits(2, 2)?
        };
        if minutes > 59 {
            return None;
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60) as i32)
    }

    fn format(&self, seconds: i32, out: &mut String) {
        if self.allow_z && seconds == 0 {
            out.push('Z');
            return;
        }
        let sign = if seconds < 0 { '-' } else { '+' };
        let abs = seconds.unsigned_abs();
        let _ = write!(out, "{}{:02}", sign, abs / 3600);
        if self.extended {
            out.push(':');
        }
        let _ = write!(out, "{:02}", (abs % 3600) / 60);
    }
}

/// A field or separator of the date/time part of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Year,
    Month { padded: bool },
    Day { padded: bool },
    Hour,
    Minute,
    Second,
    Literal(&'static str),
}

impl Token {
    fn compile(c: char, run: usize) -> Option<Self> {
        let token = match (c, run) {
            ('y', 4) => Token::Year,
            ('M', 1 | 2) => Token::Month { padded: run == 2 },
            ('d', 1 | 2) => Token::Day { padded: run == 2 },
            ('H', 2) => Token::Hour,
            ('m', 2) => Token::Minute,
            ('s', 2) => Token::Second,
            ('T', 1) => Token::Literal("T"),
            (' ', 1) => Token::Literal(" "),
            ('-', 1) => Token::Literal("-"),
            ('/', 1) => Token::Literal("/"),
            ('.', 1) => Token::Literal("."),
            (':', 1) => Token::Literal(":"),
            _ => return None,
        };
        Some(token)
    }

    fn item(self) -> Item<'static> {
        let pad = |padded: bool| if padded { Pad::Zero } else { Pad::None };
        match self {
            Token::Year => Item::Numeric(Numeric::Year, Pad::Zero),
            Token::Month { padded } => Item::Numeric(Numeric::Month, pad(padded)),
            Token::Day { padded } => Item::Numeric(Numeric::Day, pad(padded)),
            Token::Hour => Item::Numeric(Numeric::Hour, Pad::Zero),
            Token::Minute => Item::Numeric(Numeric::Minute, Pad::Zero),
            Token::Second => Item::Numeric(Numeric::Second, Pad::Zero),
            Token::Literal(s) => Item::Literal(s),
        }
    }
}

/// A compiled pattern: date/time fields, then optional fractional seconds,
/// then an optional timezone.
///
/// Fields are written through chrono format items. Reading stays strict:
/// padded fields need both digits, which chrono's parser does not require.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pattern: String,
    tokens: Vec<Token>,
    items: Vec<Item<'static>>,
    /// Most fractional digits accepted after the seconds.
    fraction: Option<usize>,
    /// A single space separates the timezone.
    zone_separated: bool,
    zone: Option<Zone>,
}

impl Layout {
    fn compile(pattern: &str) -> Option<Self> {
        let body = pattern.trim_end_matches(['X', 'x']);
        let letters = &pattern[body.len()..];
        let zone = match letters.chars().next() {
            None => None,
            Some(c) if letters.chars().all(|l| l == c) && letters.len() <= 3 => {
                Some(Zone::new(letters.len(), c == 'X'))
            }
            Some(_) => return None,
        };
        let (body, zone_separated) = match body.strip_suffix(' ') {
            Some(rest) if zone.is_some() => (rest, true),
            _ => (body, false),
        };

        let digits = body.len() - body.trim_end_matches('S').len();
        let (body, fraction) = if digits > 0 {
            (body[..body.len() - digits].strip_suffix('.')?, Some(digits))
        } else {
            (body, None)
        };

        let chars: Vec<char> = body.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let run = chars[i..].iter().take_while(|&&d| d == c).count();
            tokens.push(Token::compile(c, run)?);
            i += run;
        }
        Some(Self {
            pattern: pattern.to_string(),
            items: tokens.iter().map(|t| t.item()).collect(),
            tokens,
            fraction,
            zone_separated,
            zone,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn has_zone(&self) -> bool {
        self.zone.is_some()
    }

    /// Parse text that must match the layout completely.
    pub fn parse(&self, text: &str) -> Option<Temporal> {
        let mut cur = Cursor::new(text);
        let (mut year, mut month, mut day) = (1970, 1, 1);
        let (mut hour, mut minute, mut second, mut nano) = (0, 0, 0, 0);
        for token in &self.tokens {
            match *token {
                Token::Year => year = cur.digits(4, 4)? as i32,
                Token::Month { padded } => month = cur.digits(if padded { 2 } else { 1 }, 2)?,
                Token::Day { padded } => day = cur.digits(if padded { 2 } else { 1 }, 2)?,
                Token::Hour => hour = cur.digits(2, 2)?,
                Token::Minute => minute = cur.digits(2, 2)?,
                Token::Second => second = cur.digits(2, 2)?,
                Token::Literal(s) => {
                    if !cur.eat_str(s) {
                        return None;
                    }
                }
            }
        }
        if let Some(max) = self.fraction {
            if cur.eat(b'.') {
                let start = cur.pos;
                let value = cur.digits(1, max)?;
                nano = value * 10u32.pow(9 - (cur.pos - start) as u32);
            }
        }
        let offset = match &self.zone {
            Some(zone) => {
                if self.zone_separated && !cur.eat(b' ') {
                    return None;
                }
                Some(zone.parse(&mut cur)?)
            }
            None => None,
        };
        if !cur.at_end() {
            return None;
        }
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nano)?;
        Some(Temporal {
            datetime: NaiveDateTime::new(date, time),
            offset,
        })
    }

    pub fn format(&self, value: &Temporal) -> String {
        let dt = value.datetime;
        let mut out = dt.format_with_items(self.items.iter()).to_string();
        if let Some(max) = self.fraction {
            let scaled = dt.nanosecond() / 10u32.pow(9 - max as u32);
            if scaled > 0 {
                let digits = format!("{:0width$}", scaled, width = max);
                out.push('.');
                out.push_str(digits.trim_end_matches('0'));
            }
        }
        if let Some(zone) = &self.zone {
            if self.zone_separated {
                out.push(' ');
            }
            zone.format(value.offset.map_or(0, |o| o.local_minus_utc()), &mut out);
        }
        out
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { bytes: text.as_bytes(), pos: 0 }
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.bytes.get(self.pos) == Some(&b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.bytes[self.pos..].starts_with(s.as_bytes()) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn at_digit(&self) -> bool {
        self.bytes.get(self.pos).is_some_and(u8::is_ascii_digit)
    }

    fn at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    /// Read between `min` and `max` ASCII digits.
    fn digits(&mut self, min: usize, max: usize) -> Option<u32> {
        let mut value = 0u32;
        let mut count = 0;
        while count < max && self.at_digit() {
            value = value * 10 + u32::from(self.bytes[self.pos] - b'0');
            self.pos += 1;
            count += 1;
        }
        (count >= min).then_some(value)
    }
}
