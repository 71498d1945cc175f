//! Proxy-profile benchmarking engine
//!
//! Takes a heterogeneous bag of proxy descriptions (share links, base64
//! blobs, clash YAML, local files, or subscription URLs), normalizes it
//! into an ordered list of profiles, and concurrently probes each one for
//! latency and sustained download throughput. Progress streams to an
//! injected message sink as typed events; results can optionally be
//! handed to a summary-image renderer.

pub mod clash;
pub mod cli;
pub mod error;
pub mod event;
pub mod link;
pub mod options;
pub mod parser;
pub mod probe;
pub mod report;
pub mod runner;

pub use error::{Error, Result};
pub use event::{EmptyMessageWriter, Event, EventSink, MessageWriter, OutputMessageWriter};
pub use options::{
    PicMode, SpeedTestMode, TestMode, TestOptions, parse_message, parse_options,
    parse_retest_message,
};
pub use parser::parse_links;
pub use probe::{Downloader, HttpDownloader, Pinger, TcpPinger};
pub use report::{Node, NoopRenderer, RenderOptions, Renderer, sort_nodes};
pub use runner::ProfileTest;
