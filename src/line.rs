//! Log lines inside a record.
//!
//! Services write one of two layouts: `2024-01-31 23:59:59.123 | INFO | ...`
//! (loguru style) or `2024-01-31T23:59:59.123456Z INFO ...` (tracing style).
//! Lines that match neither continue the message above them, which keeps
//! stack traces and pretty-printed payloads with the line that logged them.

use chrono::NaiveDateTime;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::LazyLock;

use crate::record::LogRecord;

static PIPE_SEPARATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<at>[0-9]{4}-[0-9]{2}-[0-9]{2}[T ][0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3,6}Z?)\s*\|\s*",
        r"(?P<level>\S+)\s*\|\s*",
        r"(?P<message>.+)$",
    ))
    .expect("pipe-separated line pattern")
});

static SPACE_SEPARATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<at>[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{6}Z)\s+",
        r"(?P<level>\S+)\s+",
        r"(?P<message>.+)$",
    ))
    .expect("space-separated line pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Unknown,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
        LogLevel::Unknown,
    ];

    /// Level as printed by the service; anything unrecognised is `Unknown`
    pub fn parse(level: &str) -> Self {
        match level.trim() {
            "ERROR" => LogLevel::Error,
            "WARN" | "WARNING" => LogLevel::Warn,
            "INFO" => LogLevel::Info,
            "DEBUG" => LogLevel::Debug,
            "TRACE" => LogLevel::Trace,
            _ => LogLevel::Unknown,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
            LogLevel::Unknown => "UNKNOWN",
        };
        f.pad(name)
    }
}

/// One logged event, continuation lines included in `message`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    fn parse(line: &str) -> Option<Self> {
        let caps = PIPE_SEPARATED
            .captures(line)
            .or_else(|| SPACE_SEPARATED.captures(line))?;
        let timestamp = parse_line_time(&caps["at"])?;
        Some(Self {
            timestamp,
            level: LogLevel::parse(&caps["level"]),
            message: caps["message"].to_string(),
        })
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {:<5}  {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f"),
            self.level,
            self.message
        )
    }
}

// The patterns guarantee ASCII `YYYY-MM-DD?HH:MM:SS.f`, so byte 10 is the separator
fn parse_line_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim_end_matches('Z');
    let (date, time) = text.split_at(10);
    NaiveDateTime::parse_from_str(&format!("{}T{}", date, &time[1..]), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
}

/// Split decoded log text into events.
///
/// Text before the first recognisable line has nothing to attach to and is
/// left out. The record itself still carries it.
pub fn parse_lines(text: &str) -> Vec<LogLine> {
    let mut lines: Vec<LogLine> = Vec::new();
    for raw in text.lines() {
        let raw = raw.trim_end_matches('\0');
        if let Some(line) = LogLine::parse(raw) {
            lines.push(line);
        } else if let Some(last) = lines.last_mut() {
            last.message.push('\n');
            last.message.push_str(raw);
        }
    }
    lines
}

/// Level and text filter over log lines.
///
/// The pattern is a case-insensitive regex tried against the message, the
/// level name and the timestamp.
#[derive(Debug, Clone)]
pub struct LineFilter {
    levels: Vec<LogLevel>,
    pattern: Option<Regex>,
}

impl Default for LineFilter {
    fn default() -> Self {
        Self {
            levels: LogLevel::ALL.to_vec(),
            pattern: None,
        }
    }
}

impl LineFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only these levels
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = LogLevel>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    /// Keep only lines matching `pattern`; an empty pattern keeps everything
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = if pattern.is_empty() {
            None
        } else {
            Some(RegexBuilder::new(pattern).case_insensitive(true).build()?)
        };
        Ok(self)
    }

    pub fn matches(&self, line: &LogLine) -> bool {
        if !self.levels.contains(&line.level) {
            return false;
        }
        let Some(pattern) = &self.pattern else {
            return true;
        };
        pattern.is_match(&line.message)
            || pattern.is_match(&line.level.to_string())
            || pattern.is_match(&line.timestamp.to_string())
    }

    /// Matching lines of every record in `records`, record by record
    pub fn select<'a>(&self, records: impl IntoIterator<Item = &'a LogRecord>) -> Vec<LogLine> {
        records
            .into_iter()
            .flat_map(|record| record.lines())
            .filter(|line| self.matches(line))
            .collect()
    }
}
