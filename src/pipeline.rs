//! Bundle in, [`LogCollection`] out.
//!
//! Members are read one after another from the source, then decoded,
//! stamped and assembled on the blocking pool, at most
//! [`IngestConfig::workers`] at a time. Entries never see each other; the
//! final sort puts the records back in a deterministic order no matter which
//! task finished first.

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use crate::collection::{IngestStats, LogCollection};
use crate::config::IngestConfig;
use crate::decode::decode;
use crate::error::{EntryError, IngestError};
use crate::io::{MemoryReader, ReadAt};
use crate::record::LogRecord;
use crate::stamp::{Extracted, FileStamp, StampExtractor};
use crate::zip::{ArchiveEntry, ArchiveReader, EntryKind};

/// Ingest an uploaded bundle with the default configuration
pub async fn ingest(bytes: Vec<u8>) -> Result<LogCollection, IngestError> {
    ingest_with(bytes, &IngestConfig::default()).await
}

pub async fn ingest_with(
    bytes: Vec<u8>,
    config: &IngestConfig,
) -> Result<LogCollection, IngestError> {
    ingest_from(Arc::new(MemoryReader::new(bytes)), config).await
}

/// Ingest a bundle from any random-access source.
///
/// Fails only when the container itself is unusable. Members that cannot be
/// read or decoded are logged and left out.
pub async fn ingest_from<R: ReadAt + 'static>(
    reader: Arc<R>,
    config: &IngestConfig,
) -> Result<LogCollection, IngestError> {
    ingest_observed(reader, config, |_| {}).await
}

/// How far an ingestion has got
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    /// Path of the member handled last
    pub member: Option<String>,
    /// Central Directory members passed so far, skipped ones included
    pub members_done: usize,
    pub members_total: usize,
    /// Decoded text of the entries finished so far
    pub bytes: usize,
}

impl Progress {
    pub fn percentage(&self) -> f64 {
        if self.members_total == 0 {
            return 0.0;
        }
        100.0 * self.members_done as f64 / self.members_total as f64
    }
}

/// [`ingest_from`], calling `on_progress` after every qualifying member
pub async fn ingest_observed<R, F>(
    reader: Arc<R>,
    config: &IngestConfig,
    mut on_progress: F,
) -> Result<LogCollection, IngestError>
where
    R: ReadAt + 'static,
    F: FnMut(&Progress) + Send,
{
    let started = Instant::now();
    let extractor = Arc::new(StampExtractor::default());

    let selector = config.services.clone();
    let naming = extractor.clone();
    let archive = ArchiveReader::new(reader)
        .with_nested(config.expand_nested)
        .with_filter(move |path| selector.accepts(&naming.extract(path).service_name));

    let mut entries = archive.entries().await?;
    tracing::debug!("Bundle has {} members", entries.member_count());

    let mut batch = Batch::new(extractor, config.workers);

    while let Some(outcome) = entries.next().await {
        let member = match outcome {
            Ok(entry) if entry.kind == EntryKind::NestedArchive => {
                let path = entry.path.clone();
                expand_nested(&mut batch, entry).await;
                path
            }
            Ok(entry) => {
                let path = entry.path.clone();
                batch.submit(entry.path, entry.kind, entry.data).await;
                path
            }
            Err(e) => {
                let path = e.path().to_string();
                batch.reject(e);
                path
            }
        };

        on_progress(&Progress {
            member: Some(member),
            members_done: entries.position(),
            members_total: entries.member_count(),
            bytes: batch.stats.bytes,
        });
    }

    let collection = batch.finish(started).await;
    let stats = collection.stats();
    tracing::info!(
        "Ingested {} records from {} services ({} skipped, {} bytes) in {:?}",
        stats.records,
        collection.list_services().count(),
        stats.skipped,
        stats.bytes,
        stats.elapsed
    );
    Ok(collection)
}

/// Open a bundle inside the bundle, one level deep.
///
/// Inner members are named after the outer member so they keep its service
/// and stamp.
async fn expand_nested(batch: &mut Batch, entry: ArchiveEntry) {
    let inner = ArchiveReader::new(Arc::new(MemoryReader::new(entry.data)));
    let mut inner_entries = match inner.entries().await {
        Ok(inner_entries) => inner_entries,
        Err(e) => {
            batch.reject(EntryError::Unreadable {
                path: entry.path,
                reason: e.to_string(),
            });
            return;
        }
    };

    while let Some(outcome) = inner_entries.next().await {
        match outcome {
            Ok(inner_entry) => {
                let path = format!("{}/{}", entry.path, inner_entry.path);
                batch.submit(path, inner_entry.kind, inner_entry.data).await;
            }
            Err(EntryError::Unreadable { path, reason }) => {
                batch.reject(EntryError::Unreadable {
                    path: format!("{}/{}", entry.path, path),
                    reason,
                });
            }
        }
    }
}

type Processed = Result<(LogRecord, usize), EntryError>;

/// Entries in flight and everything finished so far
struct Batch {
    extractor: Arc<StampExtractor>,
    workers: usize,
    tasks: JoinSet<Processed>,
    records: Vec<LogRecord>,
    stats: IngestStats,
    sequence: usize,
}

impl Batch {
    fn new(extractor: Arc<StampExtractor>, workers: usize) -> Self {
        Self {
            extractor,
            workers: workers.max(1),
            tasks: JoinSet::new(),
            records: Vec::new(),
            stats: IngestStats::default(),
            sequence: 0,
        }
    }

    async fn submit(&mut self, path: String, kind: EntryKind, data: Vec<u8>) {
        while self.tasks.len() >= self.workers {
            self.join_one().await;
        }

        self.stats.entries += 1;
        let sequence = self.sequence;
        self.sequence += 1;

        let extractor = self.extractor.clone();
        self.tasks
            .spawn_blocking(move || process(&extractor, &path, kind, data, sequence));
    }

    fn reject(&mut self, error: EntryError) {
        self.stats.entries += 1;
        self.skip(error);
    }

    fn skip(&mut self, error: EntryError) {
        tracing::warn!("Skipping {}", error);
        self.stats.skipped += 1;
    }

    /// Collect one finished entry; `false` once nothing is in flight
    async fn join_one(&mut self) -> bool {
        match self.tasks.join_next().await {
            None => false,
            Some(Ok(Ok((record, bytes)))) => {
                self.stats.bytes += bytes;
                self.records.push(record);
                true
            }
            Some(Ok(Err(e))) => {
                self.skip(e);
                true
            }
            Some(Err(e)) => {
                tracing::warn!("Entry task failed: {}", e);
                self.stats.skipped += 1;
                true
            }
        }
    }

    async fn finish(mut self, started: Instant) -> LogCollection {
        while self.join_one().await {}

        let stats = IngestStats {
            records: self.records.len(),
            elapsed: started.elapsed(),
            ..self.stats
        };
        LogCollection::from_records(self.records).with_stats(stats)
    }
}

/// Decompressor, extractor and assembler for one entry
fn process(
    extractor: &StampExtractor,
    path: &str,
    kind: EntryKind,
    data: Vec<u8>,
    sequence: usize,
) -> Processed {
    let decoded = decode(path, kind, data)?;
    if decoded.lossy {
        tracing::debug!("{}: invalid UTF-8 replaced", path);
    }

    let Extracted {
        service_name,
        stamp,
    } = extractor.extract(path);
    match stamp {
        FileStamp::Parsed { .. } => {}
        FileStamp::Malformed { convention } => {
            tracing::debug!("{}: {} stamp is not a valid time", path, convention)
        }
        FileStamp::Unmatched => tracing::debug!("{}: no timestamp in name", path),
    }

    let bytes = decoded.text.len();
    let record = LogRecord::assemble(service_name, stamp.timestamp(), path, &decoded.text, sequence);
    Ok((record, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_builds_a_stamped_record() {
        let extractor = StampExtractor::default();
        let (record, bytes) = process(
            &extractor,
            "svc/01-31-2024_23:59:59.log",
            EntryKind::PlainLog,
            b"boot\n".to_vec(),
            7,
        )
        .unwrap();

        assert_eq!(bytes, 5);
        assert_eq!(record.service_name(), "svc");
        assert_eq!(
            record.timestamp().map(|t| t.to_string()),
            Some("2024-01-31 23:59:59".to_string())
        );
        assert_eq!(record.content(), "File: svc/01-31-2024_23:59:59.log\n\nboot\n");
        assert_eq!(record.sequence(), 7);
    }

    #[test]
    fn process_reports_bad_gzip() {
        let extractor = StampExtractor::default();
        let err = process(
            &extractor,
            "svc/svc-20240131-235959.gz",
            EntryKind::GzipLog,
            b"\x1f\x8b garbage".to_vec(),
            0,
        )
        .unwrap_err();
        assert_eq!(err.path(), "svc/svc-20240131-235959.gz");
    }

    #[tokio::test]
    async fn progress_follows_the_central_directory() {
        use flate2::Crc;

        // Two stored members plus a non-log that is passed over
        let mut zip = Vec::new();
        let mut central = Vec::new();
        let members: [(&str, &[u8]); 3] = [
            ("kraken/01-01-2024_00:00:00.log", b"one\n"),
            ("kraken/settings.json", b"{}"),
            ("beacon/01-02-2024_00:00:00.log", b"two\n"),
        ];
        for (name, data) in members {
            let mut crc = Crc::new();
            crc.update(data);
            let offset = zip.len() as u32;
            let sizes = [crc.sum(), data.len() as u32, data.len() as u32];

            zip.extend_from_slice(b"PK\x03\x04");
            zip.extend_from_slice(&[20, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
            sizes.iter().for_each(|v| zip.extend_from_slice(&v.to_le_bytes()));
            zip.extend_from_slice(&(name.len() as u16).to_le_bytes());
            zip.extend_from_slice(&[0, 0]);
            zip.extend_from_slice(name.as_bytes());
            zip.extend_from_slice(data);

            central.extend_from_slice(b"PK\x01\x02");
            central.extend_from_slice(&[20, 0, 20, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
            sizes.iter().for_each(|v| central.extend_from_slice(&v.to_le_bytes()));
            central.extend_from_slice(&(name.len() as u16).to_le_bytes());
            central.extend_from_slice(&[0; 12]);
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(name.as_bytes());
        }
        let cd_offset = zip.len() as u32;
        zip.extend_from_slice(&central);
        zip.extend_from_slice(b"PK\x05\x06\0\0\0\0\x03\0\x03\0");
        zip.extend_from_slice(&(central.len() as u32).to_le_bytes());
        zip.extend_from_slice(&cd_offset.to_le_bytes());
        zip.extend_from_slice(&[0, 0]);

        let mut seen = Vec::new();
        let logs = ingest_observed(
            Arc::new(MemoryReader::new(zip)),
            &IngestConfig::default().with_workers(1),
            |progress| seen.push(progress.clone()),
        )
        .await
        .unwrap();

        assert_eq!(logs.len(), 2);
        let done: Vec<_> = seen.iter().map(|p| p.members_done).collect();
        assert_eq!(done, vec![1, 3]);
        assert!(seen.iter().all(|p| p.members_total == 3));
        assert_eq!(
            seen[1].member.as_deref(),
            Some("beacon/01-02-2024_00:00:00.log")
        );
        assert_eq!(seen[1].percentage(), 100.0);
        // With one worker the first entry is finished before the second starts
        assert_eq!(seen[1].bytes, 4);
    }

    #[tokio::test]
    async fn not_a_zip_is_corrupt() {
        let err = ingest(b"PK but not really".to_vec()).await.unwrap_err();
        assert!(matches!(err, IngestError::ArchiveCorrupt(_)));

        let err = ingest(Vec::new()).await.unwrap_err();
        assert!(matches!(err, IngestError::ArchiveCorrupt(_)));
    }
}
