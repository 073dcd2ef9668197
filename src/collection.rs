//! The sorted result of one ingestion.

use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Duration;

use crate::record::LogRecord;

/// Bookkeeping for one ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Members that qualified as logs (nested bundle members included)
    pub entries: usize,
    pub records: usize,
    /// Qualifying members dropped because they could not be read
    pub skipped: usize,
    /// Decoded text, headers excluded
    pub bytes: usize,
    pub elapsed: Duration,
}

/// Every record from one bundle, most recent first.
///
/// Records without a timestamp come last. Ties keep bundle order, so the
/// same bundle always produces the same collection.
#[derive(Debug, Clone, Default)]
pub struct LogCollection {
    records: Vec<LogRecord>,
    services: BTreeSet<String>,
    stats: IngestStats,
}

impl LogCollection {
    pub fn from_records(mut records: Vec<LogRecord>) -> Self {
        records.sort_by(newest_first);
        let services = records
            .iter()
            .map(|r| r.service_name().to_string())
            .collect();
        let stats = IngestStats {
            records: records.len(),
            entries: records.len(),
            ..Default::default()
        };

        Self {
            records,
            services,
            stats,
        }
    }

    pub fn with_stats(mut self, stats: IngestStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Distinct service names in lexical order. Names are compared as-is,
    /// so `Kraken` and `kraken` are two services.
    pub fn list_services(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(String::as_str)
    }

    pub fn has_service(&self, service_name: &str) -> bool {
        self.services.contains(service_name)
    }

    /// Records of one service, in collection order. Unknown names give an
    /// empty view.
    pub fn filter<'a>(&'a self, service_name: &'a str) -> impl Iterator<Item = &'a LogRecord> {
        self.records
            .iter()
            .filter(move |r| r.service_name() == service_name)
    }

    /// Records stamped within `from..=to`, in collection order
    pub fn between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> impl Iterator<Item = &LogRecord> {
        self.records
            .iter()
            .filter(move |r| r.timestamp().is_some_and(|at| from <= at && at <= to))
    }

    /// The service a viewer should show first: the one with the newest log
    pub fn default_service(&self) -> Option<&str> {
        self.records.first().map(LogRecord::service_name)
    }
}

fn newest_first(a: &LogRecord, b: &LogRecord) -> Ordering {
    let by_time = match (a.timestamp(), b.timestamp()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| a.sequence().cmp(&b.sequence()))
}

/// Plain-text export of a view: each record's content exactly as stored,
/// with a blank line between records.
pub fn to_text<'a>(records: impl IntoIterator<Item = &'a LogRecord>) -> String {
    let mut out = String::new();
    for (i, record) in records.into_iter().enumerate() {
        if i > 0 {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(record.content());
    }
    out
}
