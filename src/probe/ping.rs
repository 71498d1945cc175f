//! Latency probe capability
//!
//! The engine only cares about "milliseconds or unreachable". The
//! default implementation measures a plain TCP connect to the endpoint
//! named by the link; deployments that dial through the proxy protocol
//! itself inject their own [`Pinger`].

use std::time::{Duration, Instant};

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::trace;

use crate::link::endpoint;

/// Latency probe for one profile.
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Measures latency in milliseconds. `Ok(0)` and `Err` both mean
    /// unreachable.
    async fn ping_link(&self, link: &str, attempts: u32) -> anyhow::Result<i64>;
}

/// TCP-connect latency to the link's `host:port`.
pub struct TcpPinger {
    pub timeout: Duration,
}

impl Default for TcpPinger {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(4),
        }
    }
}

#[async_trait]
impl Pinger for TcpPinger {
    async fn ping_link(&self, link: &str, attempts: u32) -> anyhow::Result<i64> {
        let (host, port) = endpoint(link)?;
        let mut last: Option<anyhow::Error> = None;
        for attempt in 0..attempts.max(1) {
            let start = Instant::now();
            match tokio::time::timeout(self.timeout, TcpStream::connect((host.as_str(), port)))
                .await
            {
                Ok(Ok(_stream)) => {
                    // Sub-millisecond connects still count as reachable.
                    return Ok((start.elapsed().as_millis() as i64).max(1));
                }
                Ok(Err(e)) => {
                    trace!("connect attempt {attempt} to {host}:{port} failed: {e}");
                    last = Some(e.into());
                }
                Err(_) => {
                    trace!("connect attempt {attempt} to {host}:{port} timed out");
                    last = Some(anyhow!("connect to {host}:{port} timed out"));
                }
            }
        }
        Err(last.unwrap_or_else(|| anyhow!("no connect attempts made")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tcp_pinger_reaches_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });
        let link = format!("trojan://pw@{}:{}?sni=x#local", addr.ip(), addr.port());
        let pinger = TcpPinger::default();
        let elapse = pinger.ping_link(&link, 2).await.unwrap();
        assert!(elapse >= 1);
    }

    #[tokio::test]
    async fn test_tcp_pinger_refused_port_errors() {
        // Bind then drop to find a port that is very likely closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let link = format!("trojan://pw@{}:{}?sni=x#dead", addr.ip(), addr.port());
        let pinger = TcpPinger {
            timeout: Duration::from_millis(500),
        };
        assert!(pinger.ping_link(&link, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_tcp_pinger_rejects_unknown_scheme() {
        let pinger = TcpPinger::default();
        assert!(pinger.ping_link("gopher://nowhere:70", 1).await.is_err());
    }
}
