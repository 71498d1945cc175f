//! Timed download capability
//!
//! A downloader streams per-second byte counts into the sample channel
//! while it runs and returns the overall average once done. It may push
//! a fresh origin into the reset channel to exclude connection setup from
//! the throughput clock. Closing the sample channel (or sending a
//! negative sentinel) terminates the sampler.
//!
//! The default implementation fetches a fixed payload URL over the direct
//! path; dialing through the proxy itself is an external concern and
//! deployments inject their own [`Downloader`] for it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Default download payload, sized so the timeout is the usual stopper.
const DEFAULT_PAYLOAD_URL: &str = "https://speed.cloudflare.com/__down?bytes=209715200";

/// Timed download through one profile.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Runs the download, streaming byte-count samples, and returns the
    /// average speed in bytes per second.
    async fn download(
        &self,
        link: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
        samples: mpsc::Sender<i64>,
        reset: mpsc::Sender<Instant>,
    ) -> anyhow::Result<i64>;
}

/// Chunked HTTP GET of a configurable payload URL.
pub struct HttpDownloader {
    pub payload_url: String,
}

impl HttpDownloader {
    pub fn new(payload_url: impl Into<String>) -> Self {
        Self {
            payload_url: payload_url.into(),
        }
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(DEFAULT_PAYLOAD_URL)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        link: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
        samples: mpsc::Sender<i64>,
        reset: mpsc::Sender<Instant>,
    ) -> anyhow::Result<i64> {
        trace!("starting payload download for {link}");
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        let mut response = client
            .get(&self.payload_url)
            .send()
            .await?
            .error_for_status()?;

        // Headers are in; everything before this point was handshake.
        let start = Instant::now();
        let _ = reset.send(start).await;

        let deadline = tokio::time::Instant::now() + read_timeout;
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let mut window: i64 = 0;
        let mut total: i64 = 0;
        loop {
            tokio::select! {
                chunk = response.chunk() => match chunk? {
                    Some(bytes) => {
                        window += bytes.len() as i64;
                        total += bytes.len() as i64;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if samples.send(window).await.is_err() {
                        break;
                    }
                    window = 0;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    debug!("download deadline reached for {link}");
                    break;
                }
            }
        }
        if window > 0 {
            let _ = samples.send(window).await;
        }

        let elapsed = start.elapsed().as_secs_f64();
        let avg = if elapsed > 0.0 {
            (total as f64 / elapsed) as i64
        } else {
            total
        };
        debug!("downloaded {total} bytes, avg {avg} B/s");
        Ok(avg)
    }
}
