//! Per-profile tester
//!
//! The lifecycle of testing one profile: resolve display metadata, ping,
//! optionally speed-test, publish exactly one result record. Probe
//! failures never escape this module as errors; they shape the record
//! and the event stream instead.

pub mod download;
pub mod ping;
mod sampler;

pub use download::{Downloader, HttpDownloader};
pub use ping::{Pinger, TcpPinger};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::event::{Event, EventSink};
use crate::link::{get_remarks, scheme};
use crate::options::{SpeedTestMode, TestOptions};
use crate::report::Node;
use sampler::run_sampler;

/// Ping retry budget per profile.
const PING_ATTEMPTS: u32 = 2;

/// Shared read-only state handed to every worker.
pub(crate) struct TestContext {
    pub sink: Arc<EventSink>,
    pub options: Arc<TestOptions>,
    pub pinger: Arc<dyn Pinger>,
    pub downloader: Arc<dyn Downloader>,
}

/// Outcome of the ping phase.
enum PingPhase {
    /// Test ends here; publish a record with these fields.
    Done { elapse: i64, is_ok: bool },
    /// Continue into the speed test.
    Proceed { elapse: i64 },
}

async fn ping_phase(ctx: &TestContext, id: i64, link: &str) -> PingPhase {
    if ctx.options.speed_test_mode == SpeedTestMode::SpeedOnly {
        return PingPhase::Proceed { elapse: 0 };
    }
    ctx.sink.send(&Event::start_ping(id));
    let elapse = match ctx.pinger.ping_link(link, PING_ATTEMPTS).await {
        Ok(ms) => ms,
        Err(e) => {
            debug!("ping for profile {id} failed: {e:#}");
            0
        }
    };
    ctx.sink.send(&Event::got_ping(id, elapse));
    if elapse < 1 {
        ctx.sink.send(&Event::got_speed(id, -1, -1, 0));
        return PingPhase::Done {
            elapse: 0,
            is_ok: false,
        };
    }
    if ctx.options.speed_test_mode == SpeedTestMode::PingOnly {
        ctx.sink.send(&Event::got_speed(id, -1, -1, 0));
        return PingPhase::Done { elapse, is_ok: true };
    }
    PingPhase::Proceed { elapse }
}

/// Display metadata with the positional fallback for nameless links.
fn describe(link: &str, id: i64) -> (String, String) {
    let (protocol, remarks) =
        get_remarks(link).unwrap_or_else(|_| (scheme(link).unwrap_or_default(), String::new()));
    if remarks.is_empty() {
        (protocol, format!("Profile {id}"))
    } else {
        (protocol, remarks)
    }
}

/// Tests one profile and publishes exactly one [`Node`], on every
/// termination path.
pub(crate) async fn test_one(
    ctx: &Arc<TestContext>,
    id: i64,
    link: &str,
    node_tx: &mpsc::Sender<Node>,
    traffic_tx: Option<mpsc::Sender<i64>>,
    cancel: &CancellationToken,
) {
    let (protocol, remarks) = describe(link, id);
    let base = Node {
        id,
        group: ctx.options.group_name.clone(),
        remarks,
        protocol,
        ..Default::default()
    };

    let elapse = match ping_phase(ctx, id, link).await {
        PingPhase::Done { elapse, is_ok } => {
            let node = Node {
                ping: elapse.to_string(),
                is_ok,
                ..base
            };
            let _ = node_tx.send(node).await;
            return;
        }
        PingPhase::Proceed { elapse } => elapse,
    };

    ctx.sink.send(&Event::start_speed(id));
    let (sample_tx, sample_rx) = mpsc::channel(1);
    let (reset_tx, reset_rx) = mpsc::channel(1);
    let sampler = tokio::spawn(run_sampler(
        id,
        ctx.sink.clone(),
        sample_rx,
        reset_rx,
        traffic_tx,
        cancel.clone(),
    ));

    let timeout = ctx.options.timeout;
    let outcome = tokio::select! {
        result = ctx
            .downloader
            .download(link, timeout, timeout, sample_tx.clone(), reset_tx) => Some(result),
        _ = cancel.cancelled() => None,
    };
    // Closing the sample channel ends the sampler on the non-cancel path.
    drop(sample_tx);
    let summary = sampler.await.unwrap_or_default();

    match &outcome {
        Some(Ok(speed)) if *speed < 1 => {
            ctx.sink.send(&Event::got_speed(id, -1, -1, 0));
        }
        Some(Err(e)) => {
            debug!("download for profile {id} failed: {e:#}");
            ctx.sink.send(&Event::got_speed(id, -1, -1, 0));
        }
        _ => {}
    }

    let node = Node {
        ping: elapse.to_string(),
        avg_speed: summary.avg,
        max_speed: summary.max,
        traffic: summary.sum,
        is_ok: elapse > 0,
        ..base
    };
    let _ = node_tx.send(node).await;
}
