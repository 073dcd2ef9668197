//! A decoded log file with its provenance.

use chrono::NaiveDateTime;

use crate::line::{LogLine, parse_lines};

/// One log file from a bundle, ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    service_name: String,
    timestamp: Option<NaiveDateTime>,
    content: String,
    source_path: String,
    // Reading order inside the bundle, used to break ties when sorting
    sequence: usize,
}

impl LogRecord {
    /// Build a record, prefixing `text` with a `File: <path>` header and a blank line.
    pub fn assemble(
        service_name: String,
        timestamp: Option<NaiveDateTime>,
        source_path: &str,
        text: &str,
        sequence: usize,
    ) -> Self {
        let mut content = String::with_capacity(source_path.len() + text.len() + 8);
        content.push_str("File: ");
        content.push_str(source_path);
        content.push_str("\n\n");
        content.push_str(text);

        Self {
            service_name,
            timestamp,
            content,
            source_path: source_path.to_string(),
            sequence,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }

    /// Header plus the decoded log text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The log text without the provenance header
    pub fn body(&self) -> &str {
        &self.content[self.header_len()..]
    }

    /// The body split into timestamped events, parsed on each call
    pub fn lines(&self) -> Vec<LogLine> {
        parse_lines(self.body())
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn sequence(&self) -> usize {
        self.sequence
    }

    fn header_len(&self) -> usize {
        "File: ".len() + self.source_path.len() + 2
    }
}
