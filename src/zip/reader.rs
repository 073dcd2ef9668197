use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::error::{EntryError, IngestError};
use crate::io::ReadAt;
use anyhow::{Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// What a member holds, judged by its name alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `*.log`, text as written by the service
    PlainLog,
    /// `*.gz`, a rotated log compressed with gzip
    GzipLog,
    /// `*.zip`, a bundle inside the bundle
    NestedArchive,
    Other,
}

impl EntryKind {
    pub fn classify(path: &str) -> Self {
        if path.ends_with(".gz") {
            EntryKind::GzipLog
        } else if path.ends_with(".log") {
            EntryKind::PlainLog
        } else if path.ends_with(".zip") {
            EntryKind::NestedArchive
        } else {
            EntryKind::Other
        }
    }
}

/// One qualifying member with the zip-level compression already removed
#[derive(Debug)]
pub struct ArchiveEntry {
    pub path: String,
    pub kind: EntryKind,
    pub data: Vec<u8>,
}

type PathFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Reads log members out of a zip bundle
pub struct ArchiveReader<R: ReadAt> {
    parser: ZipParser<R>,
    nested: bool,
    filter: Option<PathFilter>,
}

impl<R: ReadAt> ArchiveReader<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: ZipParser::new(reader),
            nested: false,
            filter: None,
        }
    }

    /// Also yield `*.zip` members instead of skipping them
    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Only yield members whose path passes `filter`; the rest are never read
    pub fn with_filter(mut self, filter: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Start a fresh pass over the bundle.
    ///
    /// The Central Directory is read completely before anything is yielded,
    /// so a broken container fails here and never produces partial output.
    pub async fn entries(&self) -> Result<Entries<'_, R>, IngestError> {
        let members = self
            .parser
            .list_files()
            .await
            .map_err(|e| IngestError::ArchiveCorrupt(format!("{:#}", e)))?;

        Ok(Entries {
            reader: self,
            members,
            next: 0,
        })
    }

    fn accepts(&self, path: &str, kind: EntryKind) -> bool {
        let wanted = match kind {
            EntryKind::PlainLog | EntryKind::GzipLog => true,
            EntryKind::NestedArchive => self.nested,
            EntryKind::Other => false,
        };
        wanted && self.filter.as_ref().is_none_or(|filter| filter(path))
    }

    async fn read(&self, member: &ZipFileEntry) -> Result<Vec<u8>> {
        if member.is_encrypted() {
            bail!("encrypted members are not supported");
        }

        let stored = self.parser.read_member(member).await?;
        let data = match member.compression_method {
            CompressionMethod::Stored => stored,
            CompressionMethod::Deflate => inflate(&stored, member.uncompressed_size)?,
            CompressionMethod::Unknown(method) => {
                bail!("unsupported compression method {}", method)
            }
        };

        if data.len() as u64 != member.uncompressed_size {
            bail!(
                "expected {} bytes, got {}",
                member.uncompressed_size,
                data.len()
            );
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != member.crc32 {
            bail!(
                "CRC-32 mismatch (expected {:08x}, got {:08x})",
                member.crc32,
                crc.sum()
            );
        }

        Ok(data)
    }
}

fn inflate(stored: &[u8], expected: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected.min(64 * 1024 * 1024) as usize);
    // One byte past the declared size is enough to tell it lied
    DeflateDecoder::new(stored)
        .take(expected + 1)
        .read_to_end(&mut out)?;
    Ok(out)
}

/// A single pass over the qualifying members of one bundle.
///
/// Directories and members that are not logs are skipped silently; members
/// that can't be read come out as [`EntryError`] so the caller can carry on.
pub struct Entries<'a, R: ReadAt> {
    reader: &'a ArchiveReader<R>,
    members: Vec<ZipFileEntry>,
    next: usize,
}

impl<R: ReadAt> Entries<'_, R> {
    /// Number of members in the Central Directory, qualifying or not
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Members passed so far, including the ones that were skipped
    pub fn position(&self) -> usize {
        self.next
    }

    pub async fn next(&mut self) -> Option<Result<ArchiveEntry, EntryError>> {
        while self.next < self.members.len() {
            let member = &self.members[self.next];
            self.next += 1;

            if member.is_directory {
                continue;
            }
            let kind = EntryKind::classify(&member.file_name);
            if !self.reader.accepts(&member.file_name, kind) {
                tracing::trace!("Skipping {} ({:?})", member.file_name, kind);
                continue;
            }

            let outcome = match self.reader.read(member).await {
                Ok(data) => Ok(ArchiveEntry {
                    path: member.file_name.clone(),
                    kind,
                    data,
                }),
                Err(e) => Err(EntryError::Unreadable {
                    path: member.file_name.clone(),
                    reason: format!("{:#}", e),
                }),
            };
            return Some(outcome);
        }
        None
    }
}
