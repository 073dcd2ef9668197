//! ZIP container reading for log bundles.
//!
//! ## Architecture
//!
//! - [`structures`]: on-disk records (EOCD, ZIP64 records, file headers)
//! - [`parser`]: binary parsing of those records from a [`ReadAt`](crate::io::ReadAt) source
//! - [`reader`]: the log-facing API; classifies members, removes the zip
//!   compression and verifies each member before handing it out
//!
//! ## Failure model
//!
//! The End of Central Directory and the Central Directory describe the whole
//! bundle, so any problem there is fatal. Members are independent: a bad
//! local header, a broken DEFLATE stream or a CRC mismatch only loses that
//! member.
//!
//! ## Supported Features
//!
//! - Standard ZIP format and ZIP64 directory records
//! - STORED and DEFLATE members
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod parser;
mod reader;
mod structures;

pub use parser::ZipParser;
pub use reader::{ArchiveEntry, ArchiveReader, Entries, EntryKind};
pub use structures::*;
