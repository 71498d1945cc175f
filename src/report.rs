//! Result records and the summary renderer hook
//!
//! The orchestrator aggregates one [`Node`] per profile. Rendering the
//! summary table is an external concern; the engine only sorts, formats
//! the totals line, and hands everything to whichever [`Renderer`] was
//! injected.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::options::TestOptions;

// ============================================================================
// Result Record
// ============================================================================

/// Outcome of testing one profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable index into the original link list.
    pub id: i64,
    pub group: String,
    pub remarks: String,
    pub protocol: String,
    /// Integer milliseconds as a string; `"0"` means unreachable.
    pub ping: String,
    /// Bytes per second; `0` when the speed test was skipped or dry.
    pub avg_speed: i64,
    pub max_speed: i64,
    /// True when the profile completed meaningful work.
    pub is_ok: bool,
    /// Cumulative bytes observed during the speed test.
    pub traffic: i64,
    /// Original link, populated at aggregation time.
    pub link: String,
}

fn ping_value(node: &Node) -> i64 {
    node.ping.parse().unwrap_or(0)
}

/// Reorders nodes for display. `speed`/`ping` sort ascending, the `r`
/// prefix reverses; anything else leaves the input order alone. The sort
/// is stable, so it is a pure permutation either way.
pub fn sort_nodes(nodes: &mut [Node], method: &str) {
    match method {
        "speed" => nodes.sort_by_key(|n| n.avg_speed),
        "rspeed" => nodes.sort_by_key(|n| std::cmp::Reverse(n.avg_speed)),
        "ping" => nodes.sort_by_key(ping_value),
        "rping" => nodes.sort_by_key(|n| std::cmp::Reverse(ping_value(n))),
        _ => {}
    }
}

// ============================================================================
// Renderer Hook
// ============================================================================

/// Cosmetic options forwarded to the renderer.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub language: String,
    pub font_size: u32,
    pub theme: String,
}

impl From<&TestOptions> for RenderOptions {
    fn from(options: &TestOptions) -> Self {
        Self {
            language: options.language.clone(),
            font_size: options.font_size,
            theme: options.theme.clone(),
        }
    }
}

/// Summary image generator capability.
pub trait Renderer: Send + Sync {
    /// Renders the sorted nodes to an image file at `path`.
    fn draw(
        &self,
        nodes: &[Node],
        options: &RenderOptions,
        summary: &str,
        path: &str,
    ) -> anyhow::Result<()>;

    /// Renders the sorted nodes to an inline `data:image/png;base64,…`
    /// URI.
    fn encode_b64(
        &self,
        nodes: &[Node],
        options: &RenderOptions,
        summary: &str,
    ) -> anyhow::Result<String>;
}

/// Renderer that produces nothing; the headless default.
pub struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn draw(
        &self,
        _nodes: &[Node],
        _options: &RenderOptions,
        _summary: &str,
        _path: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn encode_b64(
        &self,
        _nodes: &[Node],
        _options: &RenderOptions,
        _summary: &str,
    ) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// IEC byte count, e.g. `512B`, `1.5MiB`.
pub fn byte_count_iec(bytes: i64) -> String {
    const UNIT: i64 = 1024;
    if bytes < UNIT {
        return format!("{bytes}B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let value = bytes as f64 / div as f64;
    let unit = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{value:.1}{unit}iB")
}

/// `Xh Ym Zs` for long runs, `Ym Zs` otherwise.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{h}h {m}m {s}s")
    } else {
        format!("{m}m {s}s")
    }
}

/// The totals line handed to the renderer.
pub fn format_traffic_summary(traffic: i64, duration: Duration, ok: usize, total: usize) -> String {
    format!(
        "Total Traffic : {}. Total Time : {}. Working Nodes: [{}/{}]",
        byte_count_iec(traffic),
        format_duration(duration),
        ok,
        total
    )
}

/// Reads an image file into an inline data URI.
pub fn png_to_base64(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, ping: &str, avg: i64) -> Node {
        Node {
            id,
            ping: ping.to_string(),
            avg_speed: avg,
            ..Default::default()
        }
    }

    #[test]
    fn test_sort_speed_ascending() {
        let mut nodes = vec![node(0, "10", 300), node(1, "20", 100), node(2, "30", 200)];
        sort_nodes(&mut nodes, "speed");
        let ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
    }

    #[test]
    fn test_sort_rspeed_descending() {
        let mut nodes = vec![node(0, "10", 300), node(1, "20", 100), node(2, "30", 200)];
        sort_nodes(&mut nodes, "rspeed");
        let ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 2, 1]);
    }

    #[test]
    fn test_sort_ping_parses_strings() {
        let mut nodes = vec![node(0, "250", 0), node(1, "0", 0), node(2, "31", 0)];
        sort_nodes(&mut nodes, "ping");
        let ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
    }

    #[test]
    fn test_sort_unknown_method_keeps_order() {
        let mut nodes = vec![node(0, "1", 3), node(1, "2", 1)];
        sort_nodes(&mut nodes, "alphabetical");
        let ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn test_sort_is_permutation() {
        let mut nodes = vec![node(3, "9", 5), node(1, "7", 5), node(2, "8", 5)];
        let mut before: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        sort_nodes(&mut nodes, "rping");
        let mut after: Vec<i64> = nodes.iter().map(|n| n.id).collect();
        before.sort_unstable();
        after.sort_unstable();
        assert_eq!(before, after);
    }

    #[test]
    fn test_byte_count_iec() {
        assert_eq!(byte_count_iec(0), "0B");
        assert_eq!(byte_count_iec(512), "512B");
        assert_eq!(byte_count_iec(1024), "1.0KiB");
        assert_eq!(byte_count_iec(1536), "1.5KiB");
        assert_eq!(byte_count_iec(3 * 1024 * 1024), "3.0MiB");
        assert_eq!(byte_count_iec(5 * 1024 * 1024 * 1024), "5.0GiB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "0m 42s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_format_traffic_summary() {
        let summary = format_traffic_summary(3 * 1024 * 1024, Duration::from_secs(75), 4, 6);
        assert_eq!(
            summary,
            "Total Traffic : 3.0MiB. Total Time : 1m 15s. Working Nodes: [4/6]"
        );
    }

    #[test]
    fn test_png_to_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        std::fs::write(&path, b"fakepng").unwrap();
        let uri = png_to_base64(&path).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert!(png_to_base64(&dir.path().join("missing.png")).is_err());
    }
}
