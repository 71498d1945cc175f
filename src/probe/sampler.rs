//! Throughput sampler
//!
//! One sampler runs per speed test. It owns the running totals and the
//! clock origin, publishes a `gotspeed` event per sample, and terminates
//! on channel close, a negative sentinel, or cancellation. The summary it
//! returns feeds the profile's result record, so it is produced on every
//! exit path.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::{Event, EventSink};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SampleSummary {
    pub avg: i64,
    pub max: i64,
    pub sum: i64,
}

pub(crate) async fn run_sampler(
    id: i64,
    sink: Arc<EventSink>,
    mut samples: mpsc::Receiver<i64>,
    mut reset: mpsc::Receiver<Instant>,
    traffic_tx: Option<mpsc::Sender<i64>>,
    cancel: CancellationToken,
) -> SampleSummary {
    let mut summary = SampleSummary::default();
    let mut start = Instant::now();
    let mut reset_open = true;
    loop {
        tokio::select! {
            maybe = samples.recv() => {
                let Some(speed) = maybe else { break };
                if speed < 0 {
                    break;
                }
                summary.sum += speed;
                // Millisecond-floor seconds, matching the reported
                // resolution of the samples themselves.
                let duration = start.elapsed().as_millis() as f64 / 1000.0;
                summary.avg = if duration > 0.0 {
                    (summary.sum as f64 / duration) as i64
                } else {
                    summary.sum
                };
                if speed > summary.max {
                    summary.max = speed;
                }
                sink.send(&Event::got_speed(id, summary.avg, summary.max, speed));
                if let Some(tx) = &traffic_tx {
                    let _ = tx.send(speed).await;
                }
            }
            origin = reset.recv(), if reset_open => match origin {
                Some(instant) => start = instant,
                None => reset_open = false,
            },
            _ = cancel.cancelled() => {
                debug!("sampler for profile {id} cancelled");
                break;
            }
        }
    }
    summary
}
