//! The collection a viewer is currently showing.
//!
//! A viewer owns one [`Session`]. Every upload starts a fresh ingestion in
//! the background and the finished [`LogCollection`] replaces the previous
//! one as a whole. A newer upload aborts the older ingestion, and a result
//! that loses that race is dropped instead of published.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::collection::LogCollection;
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::io::{MemoryReader, ReadAt};
use crate::pipeline::{Progress, ingest_observed};

/// What a viewer should render
#[derive(Debug, Clone)]
pub enum SessionState {
    Empty,
    Loading { generation: u64, progress: Progress },
    Ready(Arc<LogCollection>),
    Failed(IngestError),
}

impl SessionState {
    /// The ingestion this state belongs to has ended one way or the other
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionState::Ready(_) | SessionState::Failed(_))
    }
}

pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    config: IngestConfig,
    state: watch::Sender<SessionState>,
    in_flight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(config: IngestConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Empty);
        Self {
            inner: Arc::new(Inner {
                config,
                state,
                in_flight: Mutex::new(InFlight::default()),
            }),
        }
    }

    /// Start ingesting `bytes`, superseding any ingestion still running.
    ///
    /// Must be called from within a Tokio runtime. Returns the generation
    /// number of the new ingestion.
    pub fn load(&self, bytes: Vec<u8>) -> u64 {
        self.load_from(Arc::new(MemoryReader::new(bytes)))
    }

    /// Like [`load`](Self::load), reading the bundle from any source
    pub fn load_from<R: ReadAt + 'static>(&self, reader: Arc<R>) -> u64 {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(task) = in_flight.task.take()
            && !task.is_finished()
        {
            tracing::debug!("Abandoning ingestion {}", in_flight.generation);
            task.abort();
        }

        in_flight.generation += 1;
        let generation = in_flight.generation;
        self.inner.state.send_replace(SessionState::Loading {
            generation,
            progress: Progress::default(),
        });

        let inner = self.inner.clone();
        in_flight.task = Some(tokio::spawn(async move {
            let outcome = ingest_observed(reader, &inner.config, |progress| {
                inner.report(generation, progress)
            })
            .await;
            inner.publish(generation, outcome);
        }));

        generation
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// The collection on display, if the last ingestion succeeded
    pub fn current(&self) -> Option<Arc<LogCollection>> {
        match &*self.inner.state.borrow() {
            SessionState::Ready(collection) => Some(collection.clone()),
            _ => None,
        }
    }

    /// Follow state changes, e.g. to repaint when loading finishes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = in_flight.task.take() {
            task.abort();
        }
    }
}

impl Inner {
    fn report(&self, generation: u64, progress: &Progress) {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.generation == generation {
            self.state.send_replace(SessionState::Loading {
                generation,
                progress: progress.clone(),
            });
        }
    }

    fn publish(&self, generation: u64, outcome: Result<LogCollection, IngestError>) {
        let in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.generation != generation {
            tracing::debug!(
                "Dropping result of ingestion {} (now at {})",
                generation,
                in_flight.generation
            );
            return;
        }

        let state = match outcome {
            Ok(collection) => SessionState::Ready(Arc::new(collection)),
            Err(e) => {
                tracing::warn!("Cannot load log bundle: {}", e);
                SessionState::Failed(e)
            }
        };
        self.state.send_replace(state);
    }
}
