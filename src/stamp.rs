//! Service names and timestamps recovered from member paths.
//!
//! The platform changed how it names log files over the years, and one
//! bundle can hold services still using the old scheme next to services on
//! the new one. Each scheme is a [`StampRule`]; rules are tried in order and
//! the first one that recognizes the path decides the outcome.

use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

/// `MM-DD-YYYY_HH:MM:SS`, used by services writing plain `.log` files
static PLAIN_LOG_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:^|[^0-9])(?P<stamp>",
        r"(?P<month>[0-9]{2})-(?P<day>[0-9]{2})-(?P<year>[0-9]{4})_",
        r"(?P<hour>[0-9]{2}):(?P<minute>[0-9]{2}):(?P<second>[0-9]{2}))",
        r"(?:[^0-9]|$)",
    ))
    .expect("plain log stamp pattern")
});

/// `YYYYMMDD-HHMMSS` right before `.gz`, `.log.gz` or `.zip`
static ARCHIVED_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:^|[^0-9])(?P<stamp>",
        r"(?P<year>[0-9]{4})(?P<month>[0-9]{2})(?P<day>[0-9]{2})-",
        r"(?P<hour>[0-9]{2})(?P<minute>[0-9]{2})(?P<second>[0-9]{2}))",
        r"(?:\.log)?\.(?:gz|zip)(?:/|$)",
    ))
    .expect("archived stamp pattern")
});

const SEPARATORS: [char; 2] = ['/', '\\'];
const LOG_EXTENSIONS: [&str; 3] = [".gz", ".log", ".zip"];

/// Naming scheme a timestamp was recovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    PlainLog,
    Archived,
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Convention::PlainLog => write!(f, "MM-DD-YYYY_HH:MM:SS"),
            Convention::Archived => write!(f, "YYYYMMDD-HHMMSS"),
        }
    }
}

/// Result of reading the timestamp out of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStamp {
    Parsed {
        at: NaiveDateTime,
        convention: Convention,
    },
    /// A rule recognized the shape but the numbers are not a real instant
    Malformed { convention: Convention },
    Unmatched,
}

impl FileStamp {
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            FileStamp::Parsed { at, .. } => Some(*at),
            FileStamp::Malformed { .. } | FileStamp::Unmatched => None,
        }
    }
}

/// Where a rule found its stamp and what it made of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampMatch {
    /// Byte range of the stamp inside the path
    pub span: Range<usize>,
    /// `None` when the digits don't form a valid date and time
    pub at: Option<NaiveDateTime>,
}

/// One filename convention
pub trait StampRule: Send + Sync {
    fn convention(&self) -> Convention;

    /// Whether this path belongs to the file family the convention covers
    fn applies(&self, path: &str) -> bool;

    fn find(&self, path: &str) -> Option<StampMatch>;
}

/// `service/01-31-2024_23:59:59.log`
pub struct PlainLogRule;

impl StampRule for PlainLogRule {
    fn convention(&self) -> Convention {
        Convention::PlainLog
    }

    fn applies(&self, path: &str) -> bool {
        path.ends_with(".log")
    }

    fn find(&self, path: &str) -> Option<StampMatch> {
        PLAIN_LOG_STAMP.captures(path).map(|caps| to_match(&caps))
    }
}

/// `service/service-20240131-235959.gz`, also for `.zip` bundles and the
/// members inside them
pub struct ArchivedRule;

impl StampRule for ArchivedRule {
    fn convention(&self) -> Convention {
        Convention::Archived
    }

    fn applies(&self, path: &str) -> bool {
        path.ends_with(".gz") || path.ends_with(".zip") || path.contains(".zip/")
    }

    fn find(&self, path: &str) -> Option<StampMatch> {
        ARCHIVED_STAMP.captures(path).map(|caps| to_match(&caps))
    }
}

fn to_match(caps: &Captures<'_>) -> StampMatch {
    let span = caps.name("stamp").map(|m| m.range()).unwrap_or_default();
    let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());

    let at = (|| {
        let year = i32::try_from(number("year")?).ok()?;
        NaiveDate::from_ymd_opt(year, number("month")?, number("day")?)?.and_hms_opt(
            number("hour")?,
            number("minute")?,
            number("second")?,
        )
    })();

    StampMatch { span, at }
}

/// What a path says about its log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub service_name: String,
    pub stamp: FileStamp,
}

/// Ordered set of [`StampRule`]s
pub struct StampExtractor {
    rules: Vec<Box<dyn StampRule>>,
}

impl Default for StampExtractor {
    /// Current platform conventions, oldest scheme first
    fn default() -> Self {
        Self {
            rules: vec![Box::new(PlainLogRule), Box::new(ArchivedRule)],
        }
    }
}

impl StampExtractor {
    /// An extractor with no rules; every path is unmatched
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule with the lowest priority so far
    pub fn with_rule(mut self, rule: impl StampRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn extract(&self, path: &str) -> Extracted {
        let found = self
            .rules
            .iter()
            .filter(|rule| rule.applies(path))
            .find_map(|rule| rule.find(path).map(|m| (rule.convention(), m)));

        let (stamp, span) = match found {
            Some((convention, StampMatch { span, at: Some(at) })) => {
                (FileStamp::Parsed { at, convention }, Some(span))
            }
            Some((convention, StampMatch { span, at: None })) => {
                (FileStamp::Malformed { convention }, Some(span))
            }
            None => (FileStamp::Unmatched, None),
        };

        Extracted {
            service_name: service_name(path, span),
            stamp,
        }
    }
}

/// First path component; for a bare file name, the name without its
/// extensions and without a trailing stamp.
fn service_name(path: &str, stamp: Option<Range<usize>>) -> String {
    let trimmed = path.trim_start_matches(SEPARATORS);
    let offset = path.len() - trimmed.len();

    if let Some(end) = trimmed.find(SEPARATORS) {
        return trimmed[..end].to_string();
    }

    let stem = strip_extensions(trimmed);
    if let Some(span) = stamp
        && span.start >= offset
    {
        let head = trimmed[..span.start - offset].trim_end_matches(['-', '_', '.', ' ']);
        if !head.is_empty() {
            return head.to_string();
        }
    }
    stem.to_string()
}

fn strip_extensions(name: &str) -> &str {
    let mut stem = name;
    while let Some(shorter) = LOG_EXTENSIONS
        .iter()
        .find_map(|ext| stem.strip_suffix(ext))
        .filter(|s| !s.is_empty())
    {
        stem = shorter;
    }
    stem
}
