//! Streaming clash scanner
//!
//! Strict full-document parsing falls over on the very large, very
//! decorated YAML files subscription providers hand out. The scanner
//! walks the document line by line instead, keeping everything up to and
//! including a cleaned `proxies:` section and validating each candidate
//! proxy line individually, so decorations and half-broken entries are
//! dropped rather than fatal.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::clash::{parse_base_proxy, parse_clash};
use crate::error::Result;

/// Lines whose trimmed content opens the proxies section.
const SECTION_MARKERS: [&str; 2] = ["proxies:", "Proxy:"];
/// Lines whose trimmed content ends the scan.
const SECTION_TERMINATORS: [&str; 3] = ["proxy-groups:", "rules:", "Proxy Group:"];

/// Two-state line scanner accumulating a parseable clash document.
#[derive(Default)]
struct ClashScanner {
    in_proxies: bool,
    buf: String,
}

impl ClashScanner {
    /// Feeds one line. Returns `false` once a terminator is seen.
    fn push_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if SECTION_TERMINATORS.contains(&trimmed) {
            return false;
        }
        if self.in_proxies && parse_base_proxy(trimmed).is_err() {
            // Comments, decorations, or malformed entries inside the
            // section are dropped silently.
            return true;
        }
        if !self.in_proxies && SECTION_MARKERS.contains(&trimmed) {
            self.in_proxies = true;
            self.buf.push_str("proxies:\n");
            return true;
        }
        self.buf.push_str(line);
        self.buf.push('\n');
        true
    }

    fn finish(self) -> Result<Vec<String>> {
        debug!("scanned clash document, {} bytes kept", self.buf.len());
        parse_clash(&self.buf)
    }
}

/// Scans in-memory clash content for its proxies.
///
/// Content without a single `{` cannot hold flow-form proxy entries and
/// short-circuits to an empty list.
pub fn parse_clash_stream(input: &str) -> Result<Vec<String>> {
    if !input.contains('{') {
        return Ok(Vec::new());
    }
    let mut scanner = ClashScanner::default();
    for line in input.lines() {
        if !scanner.push_line(line) {
            break;
        }
    }
    scanner.finish()
}

/// Scans a clash YAML file line by line without loading it whole.
pub async fn parse_clash_file(path: &Path) -> Result<Vec<String>> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut scanner = ClashScanner::default();
    while let Some(line) = lines.next_line().await? {
        if !scanner.push_line(&line) {
            break;
        }
    }
    scanner.finish()
}
