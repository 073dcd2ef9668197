//! Ingestion settings.

use std::num::NonZeroUsize;

use crate::select::ServiceSelector;

/// How a bundle is ingested
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Entries decoded at the same time
    pub workers: usize,

    /// Open `*.zip` members and ingest the logs inside them (one level deep)
    pub expand_nested: bool,

    /// Services to load; others are skipped before decompression
    pub services: ServiceSelector,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            expand_nested: false,
            services: ServiceSelector::default(),
        }
    }
}

impl IngestConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_nested(mut self, expand_nested: bool) -> Self {
        self.expand_nested = expand_nested;
        self
    }

    pub fn with_services(mut self, services: ServiceSelector) -> Self {
        self.services = services;
        self
    }
}
