use async_trait::async_trait;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::{Client, Response, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAt;
use anyhow::{Context, Result, anyhow, bail};

/// Attempts per range before a timeout or refused connection is fatal
const MAX_ATTEMPTS: u32 = 10;

/// Log bundle served over HTTP, e.g. straight from the vehicle's web server
///
/// Only the central directory and the members that are actually ingested are
/// fetched, using Range requests. Services filtered out never cross the link.
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: AtomicU64,
    requests: AtomicU64,
}

impl HttpRangeReader {
    /// Probe `url` with a 30 second timeout client
    pub async fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Self::with_client(client, url).await
    }

    /// Probe `url` with a HEAD request, using a caller-configured client.
    ///
    /// The server must advertise byte ranges and report the bundle size.
    pub async fn with_client(client: Client, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let resp = client
            .head(&url)
            .send()
            .await
            .with_context(|| format!("Cannot reach {}", url))?;

        if !resp.status().is_success() {
            bail!("{} answered {}", url, resp.status());
        }

        let headers = resp.headers();
        let ranged = headers
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("bytes"));
        if !ranged {
            bail!("{} does not serve byte ranges", url);
        }

        let size = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("{} did not report its size", url))?;

        tracing::debug!("Remote log bundle {} is {} bytes", url, size);

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        })
    }

    /// Body bytes received so far
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Range requests answered so far
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// GET `start..=end`, retrying timeouts and refused connections with a
    /// growing pause. Any other failure, or an answer other than 206, is final.
    async fn get_range(&self, start: u64, end: u64) -> Result<Response> {
        let range = format!("bytes={}-{}", start, end);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.client.get(&self.url).header(RANGE, &range).send().await {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => {
                    self.requests.fetch_add(1, Ordering::Relaxed);
                    return Ok(resp);
                }
                Ok(resp) => bail!("{} of {} answered {}", range, self.url, resp.status()),
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        "Fetching {} failed, retry {}/{}: {}",
                        range,
                        attempt,
                        MAX_ATTEMPTS - 1,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
                Err(e) => return Err(e).with_context(|| format!("Cannot fetch {}", range)),
            }
        }
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }

        let end = (offset + buf.len() as u64 - 1).min(self.size - 1);
        let wanted = (end - offset + 1) as usize;
        let mut received = 0;

        // Servers may answer a range with fewer bytes than asked for
        while received < wanted {
            let body = self
                .get_range(offset + received as u64, end)
                .await?
                .bytes()
                .await?;
            if body.is_empty() {
                break;
            }

            let n = body.len().min(wanted - received);
            buf[received..received + n].copy_from_slice(&body[..n]);
            received += n;
            self.transferred_bytes.fetch_add(n as u64, Ordering::Relaxed);
        }

        Ok(received)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
