//! Test orchestrator
//!
//! Drives the per-profile testers under a bounded concurrency budget.
//! Two entry points: [`ProfileTest::test_all`] streams results to the
//! caller through a channel, [`ProfileTest::run`] owns the whole
//! lifecycle including progress events, aggregation, and the renderer
//! hook.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::event::{Event, EventSink};
use crate::link::strip_display_name;
use crate::options::{PicMode, TestOptions};
use crate::probe::{Downloader, HttpDownloader, Pinger, TcpPinger, TestContext, test_one};
use crate::report::{
    Node, NoopRenderer, RenderOptions, Renderer, format_traffic_summary, sort_nodes,
};

/// Links announced per `gotservers` batch.
const SERVER_BATCH: usize = 9;

/// One benchmarking run over a fixed link list.
///
/// Options and links are read-only once constructed; capabilities default
/// to the direct-path implementations and can be swapped out for proxied
/// ones (or test fakes).
pub struct ProfileTest {
    sink: Arc<EventSink>,
    options: Arc<TestOptions>,
    links: Vec<String>,
    pinger: Arc<dyn Pinger>,
    downloader: Arc<dyn Downloader>,
    renderer: Arc<dyn Renderer>,
}

impl ProfileTest {
    pub fn new(sink: EventSink, options: TestOptions, links: Vec<String>) -> Self {
        Self {
            sink: Arc::new(sink),
            options: Arc::new(options),
            links,
            pinger: Arc::new(TcpPinger::default()),
            downloader: Arc::new(HttpDownloader::default()),
            renderer: Arc::new(NoopRenderer),
        }
    }

    pub fn with_pinger(mut self, pinger: Arc<dyn Pinger>) -> Self {
        self.pinger = pinger;
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    fn context(&self) -> Arc<TestContext> {
        Arc::new(TestContext {
            sink: self.sink.clone(),
            options: self.options.clone(),
            pinger: self.pinger.clone(),
            downloader: self.downloader.clone(),
        })
    }

    /// Streaming entry point: tests `links` with at most `max` workers
    /// and returns the result channel (capacity = number of links).
    ///
    /// Cancellation aborts admission of new workers only; already
    /// admitted workers finish and publish. The channel closes once every
    /// admitted worker has published, so consumers may simply drain to
    /// `None`. The optional traffic channel receives every byte-count
    /// sample and is never closed by the orchestrator; its lifetime
    /// belongs to the caller.
    pub fn test_all(
        &self,
        cancel: &CancellationToken,
        links: Vec<String>,
        max: usize,
        traffic_tx: Option<mpsc::Sender<i64>>,
    ) -> Result<mpsc::Receiver<Node>> {
        if links.is_empty() {
            return Err(Error::NoProfileFound);
        }
        let (node_tx, node_rx) = mpsc::channel(links.len());
        let ctx = self.context();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(max.max(1)));
            let mut workers = JoinSet::new();
            for (index, link) in links.into_iter().enumerate() {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("admission cancelled after {index} workers");
                        break;
                    }
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let ctx = ctx.clone();
                let node_tx = node_tx.clone();
                let traffic_tx = traffic_tx.clone();
                let cancel = cancel.clone();
                workers.spawn(async move {
                    let target = strip_display_name(&link).to_string();
                    test_one(&ctx, index as i64, &target, &node_tx, traffic_tx, &cancel).await;
                    drop(permit);
                });
            }
            while workers.join_next().await.is_some() {}
            // The last sender drops here, closing the result channel.
        });
        Ok(node_rx)
    }

    /// Self-driven run: emits the full event lifecycle, aggregates one
    /// result per profile, and invokes the renderer hook.
    ///
    /// Cancellation during admission stops the run without an error and
    /// without `eof`; the partial workers keep publishing events until
    /// they notice the cancellation themselves.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<Vec<Node>> {
        let total = self.links.len();
        if total < 1 {
            return Err(Error::NoProfileFound);
        }
        let started_at = Instant::now();
        info!(
            "testing {total} profiles, concurrency {}",
            self.options.concurrency
        );
        self.sink.send(&Event::started());
        for (batch_index, batch) in self.links.chunks(SERVER_BATCH).enumerate() {
            self.sink.send(&Event::got_servers(
                (batch_index * SERVER_BATCH) as i64,
                batch.to_vec(),
                self.options.group_name.clone(),
            ));
        }

        // Retests carry their own (id, link) pairs; fresh runs use the
        // link list positions.
        let retest = !self.options.test_ids.is_empty() && !self.options.links.is_empty();
        let pairs: Vec<(i64, String)> = (0..total)
            .map(|i| {
                if retest {
                    (self.options.test_ids[i], self.options.links[i].clone())
                } else {
                    (i as i64, self.links[i].clone())
                }
            })
            .collect();
        let link_by_id: HashMap<i64, String> = pairs.iter().cloned().collect();

        let (node_tx, mut node_rx) = mpsc::channel(total);
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let ctx = self.context();
        let mut workers = JoinSet::new();
        for (id, link) in pairs {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("run cancelled during admission");
                    return Ok(Vec::new());
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return Ok(Vec::new()),
                },
            };
            let ctx = ctx.clone();
            let node_tx = node_tx.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                let target = strip_display_name(&link).to_string();
                test_one(&ctx, id, &target, &node_tx, None, &cancel).await;
                ctx.sink.send(&Event::end_one(id));
                drop(permit);
            });
        }
        while workers.join_next().await.is_some() {}
        self.sink.send(&Event::eof());
        drop(node_tx);

        let mut nodes = Vec::with_capacity(total);
        let mut traffic: i64 = 0;
        let mut success = 0usize;
        while let Some(mut node) = node_rx.recv().await {
            if let Some(link) = link_by_id.get(&node.id) {
                node.link = link.clone();
            }
            traffic += node.traffic;
            if node.is_ok {
                success += 1;
            }
            nodes.push(node);
        }
        nodes.sort_by_key(|n| n.id);
        debug!(
            "run complete: {}/{} working, {} bytes of traffic",
            success, total, traffic
        );

        if self.options.generate_pic_mode == PicMode::None {
            return Ok(nodes);
        }

        sort_nodes(&mut nodes, &self.options.sort_method);
        let summary = format_traffic_summary(traffic, started_at.elapsed(), success, total);
        let render_options = RenderOptions::from(self.options.as_ref());
        match self.options.generate_pic_mode {
            PicMode::Path => {
                match self
                    .renderer
                    .draw(&nodes, &render_options, &summary, &self.options.pic_path)
                {
                    Ok(()) => self
                        .sink
                        .send(&Event::pic_data(self.options.pic_path.clone())),
                    Err(e) => warn!("failed to render summary image: {e:#}"),
                }
            }
            PicMode::Base64 => match self.renderer.encode_b64(&nodes, &render_options, &summary) {
                Ok(data) => self.sink.send(&Event::pic_data(data)),
                Err(e) => warn!("failed to encode summary image: {e:#}"),
            },
            PicMode::None => {}
        }
        Ok(nodes)
    }
}
