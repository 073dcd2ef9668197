//! # logbundle
//!
//! Turns the log bundles downloaded from a companion computer into one
//! sorted, filterable collection of service logs.
//!
//! A bundle is a zip file with one directory per service. Inside are plain
//! `.log` files and rotated `.gz` files, and their names carry timestamps in
//! whichever convention the service's logger used at the time. This crate
//! reads the bundle, decompresses each log, recovers the service name and
//! timestamp from each path, and returns every log as a [`LogRecord`] in a
//! [`LogCollection`], newest first.
//!
//! ## Features
//!
//! - Bundles from memory, the local filesystem or HTTP (Range requests)
//! - STORED and DEFLATE zip members, ZIP64 directories, CRC-32 checks
//! - Both historical filename conventions (`MM-DD-YYYY_HH:MM:SS` and `YYYYMMDD-HHMMSS`)
//! - Unreadable members are skipped; only a broken container fails
//! - Parallel decoding of entries
//! - Optional expansion of zip files nested inside the bundle
//! - Per-line view of each log with level and regex filtering
//! - Progress reporting while a bundle loads
//!
//! ## Example
//!
//! ```no_run
//! # async fn run(bytes: Vec<u8>) -> Result<(), logbundle::IngestError> {
//! let logs = logbundle::ingest(bytes).await?;
//!
//! for service in logs.list_services() {
//!     println!("{}", service);
//! }
//! if let Some(service) = logs.default_service() {
//!     for record in logs.filter(service) {
//!         println!("{}", record.content());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collection;
pub mod config;
pub mod decode;
pub mod error;
pub mod io;
pub mod line;
pub mod pipeline;
pub mod record;
pub mod select;
pub mod session;
pub mod stamp;
pub mod zip;

pub use cli::Cli;
pub use collection::{IngestStats, LogCollection, to_text};
pub use config::IngestConfig;
pub use error::{EntryError, IngestError};
pub use io::{HttpRangeReader, LocalFileReader, MemoryReader, ReadAt};
pub use line::{LineFilter, LogLevel, LogLine, parse_lines};
pub use pipeline::{Progress, ingest, ingest_from, ingest_observed, ingest_with};
pub use record::LogRecord;
pub use select::ServiceSelector;
pub use session::{Session, SessionState};
pub use stamp::{Convention, FileStamp, StampExtractor, StampRule};
pub use zip::{ArchiveEntry, ArchiveReader, EntryKind};
