//! # session tests
//!
//! The viewer-facing holder of the current collection: publication,
//! failures, and newer uploads replacing older ones.

mod common;

use async_trait::async_trait;
use common::ZipBuilder;
use logbundle::{IngestConfig, IngestError, MemoryReader, ReadAt, Session, SessionState};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// A bundle source that stalls on one offset until released
struct Gated {
    bytes: MemoryReader,
    stall_at: u64,
    gate: Semaphore,
}

impl Gated {
    fn new(bytes: Vec<u8>, stall_at: u64) -> Self {
        Self {
            bytes: MemoryReader::new(bytes),
            stall_at,
            gate: Semaphore::new(0),
        }
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl ReadAt for Gated {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> anyhow::Result<usize> {
        if offset == self.stall_at {
            let _permit = self.gate.acquire().await?;
        }
        self.bytes.read_at(offset, buf).await
    }

    fn size(&self) -> u64 {
        self.bytes.size()
    }
}

fn bundle(service: &str) -> Vec<u8> {
    ZipBuilder::new()
        .stored(&format!("{}/01-01-2024_00:00:00.log", service), b"hello\n")
        .finish()
}

async fn settled(session: &Session) -> SessionState {
    let mut rx = session.subscribe();
    let state = rx.wait_for(SessionState::is_settled).await.unwrap();
    state.clone()
}

#[tokio::test]
async fn starts_empty() {
    let session = Session::new(IngestConfig::default());
    assert!(matches!(session.state(), SessionState::Empty));
    assert!(session.current().is_none());
}

#[tokio::test]
async fn publishes_the_collection() {
    let session = Session::new(IngestConfig::default());
    let generation = session.load(bundle("kraken"));
    assert_eq!(generation, 1);

    match settled(&session).await {
        SessionState::Ready(logs) => {
            assert_eq!(logs.default_service(), Some("kraken"));
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(session.current().unwrap().len(), 1);
}

#[tokio::test]
async fn corrupt_upload_is_reported() {
    let session = Session::new(IngestConfig::default());
    session.load(b"garbage".to_vec());

    match settled(&session).await {
        SessionState::Failed(IngestError::ArchiveCorrupt(_)) => {}
        other => panic!("unexpected state {:?}", other),
    }
    assert!(session.current().is_none());
}

#[tokio::test]
async fn newer_upload_wins() {
    let session = Session::new(IngestConfig::default());
    session.load(bundle("kraken"));
    let generation = session.load(bundle("beacon"));
    assert_eq!(generation, 2);

    let logs = match settled(&session).await {
        SessionState::Ready(logs) => logs,
        other => panic!("unexpected state {:?}", other),
    };
    assert_eq!(logs.list_services().collect::<Vec<_>>(), vec!["beacon"]);
}

#[tokio::test]
async fn new_upload_replaces_the_previous_collection() {
    let session = Session::new(IngestConfig::default());
    session.load(bundle("kraken"));
    settled(&session).await;
    let first = session.current().unwrap();

    session.load(bundle("beacon"));
    assert!(matches!(
        session.state(),
        SessionState::Loading { generation: 2, .. }
    ));
    settled(&session).await;
    let second = session.current().unwrap();

    // The old collection is untouched; readers holding it keep a consistent view
    assert_eq!(first.default_service(), Some("kraken"));
    assert_eq!(second.default_service(), Some("beacon"));
}

#[tokio::test]
async fn progress_is_published_while_loading() {
    let first = "kraken/01-01-2024_00:00:00.log";
    let bytes = ZipBuilder::new()
        .stored(first, b"hello\n")
        .stored("beacon/01-02-2024_00:00:00.log", b"world\n")
        .finish();
    // The second member's local header starts right after the first member
    let second_member = (30 + first.len() + b"hello\n".len()) as u64;
    let source = Arc::new(Gated::new(bytes, second_member));

    let session = Session::new(IngestConfig::default());
    let mut rx = session.subscribe();
    session.load_from(source.clone());

    let state = rx
        .wait_for(|state| {
            matches!(state, SessionState::Loading { progress, .. } if progress.members_done > 0)
        })
        .await
        .unwrap()
        .clone();
    match state {
        SessionState::Loading {
            generation,
            progress,
        } => {
            assert_eq!(generation, 1);
            assert_eq!(progress.member.as_deref(), Some(first));
            assert_eq!(progress.members_done, 1);
            assert_eq!(progress.members_total, 2);
            assert_eq!(progress.percentage(), 50.0);
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert!(session.current().is_none());

    source.release();
    match settled(&session).await {
        SessionState::Ready(logs) => assert_eq!(logs.len(), 2),
        other => panic!("unexpected state {:?}", other),
    }
}
