//! Local file parser
//!
//! Last stage of the ingestion chain: when the input (trimmed) names an
//! existing file, its content is parsed in place. YAML files stream
//! through the clash scanner; anything else is tried as base64 and, when
//! that fails, sniffed by its first 128 bytes.

use std::path::Path;

use tracing::debug;

use crate::error::Result;

use super::base64::parse_base64;
use super::profiles::parse_profiles;
use super::stream::parse_clash_file;

/// Markers that identify a plain-text profile dump in a sniffed preview.
const LINK_MARKERS: [&str; 4] = ["vmess://", "trojan://", "ssr://", "ss://"];

fn is_yaml_file(path: &str) -> bool {
    path.ends_with(".yaml") || path.ends_with(".yml")
}

/// Parses profiles out of a local file named by the input.
pub async fn parse_file(input: &str) -> Result<Vec<String>> {
    let path_str = input.trim();
    let path = Path::new(path_str);
    tokio::fs::metadata(path).await?;
    debug!("parsing local file {path_str}");

    if is_yaml_file(path_str) {
        return parse_clash_file(path).await;
    }

    let bytes = tokio::fs::read(path).await?;
    let data = String::from_utf8_lossy(&bytes);
    match parse_base64(&data) {
        Ok(links) => Ok(links),
        Err(err) => {
            if bytes.len() > 128 {
                let preview = String::from_utf8_lossy(&bytes[..128]);
                if preview.contains("proxies:") {
                    return parse_clash_file(path).await;
                }
                if LINK_MARKERS.iter().any(|m| preview.contains(m)) {
                    return Ok(parse_profiles(&data));
                }
            }
            Err(err)
        }
    }
}
