//! Profile ingestion pipeline
//!
//! Turns one free-form message into an ordered list of share links. A
//! message may be a subscription URL, a pasted block of links, a base64
//! blob, a clash YAML document, or a path to a local file holding any of
//! those; parsers are tried in that order and the first one producing a
//! non-empty list wins. An empty success is treated as "not this format"
//! and falls through.

pub mod base64;
pub mod file;
pub mod profiles;
pub mod stream;

pub use stream::parse_clash_stream;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::clash::parse_clash;
use crate::error::{Error, Result};
use crate::link::is_url;

/// Total budget for one subscription fetch.
const SUBSCRIPTION_TIMEOUT: Duration = Duration::from_secs(20);

/// Resolves a message into its profile links.
///
/// Deterministic for non-URL inputs: the same message always yields the
/// same links in the same order. Fails only when every parser rejected
/// the input.
pub fn parse_links(message: &str) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> {
    Box::pin(async move {
        if is_url(message) {
            return get_subscription_links(message.trim()).await;
        }

        let links = profiles::parse_profiles(message);
        if !links.is_empty() {
            debug!("profile parser matched {} links", links.len());
            return Ok(links);
        }
        if let Ok(links) = base64::parse_base64(message)
            && !links.is_empty()
        {
            debug!("base64 parser matched {} links", links.len());
            return Ok(links);
        }
        if let Ok(links) = parse_clash(message)
            && !links.is_empty()
        {
            debug!("clash parser matched {} links", links.len());
            return Ok(links);
        }
        match file::parse_file(message).await {
            Ok(links) if !links.is_empty() => {
                debug!("file parser matched {} links", links.len());
                Ok(links)
            }
            _ => Err(Error::NoProfileFound),
        }
    })
}

/// Fetches a subscription URL and parses its body.
///
/// Typical subscriptions are base64; on decode failure the body is
/// treated as a clash document. Decoded bodies re-enter [`parse_links`],
/// so a subscription may itself point at another subscription.
async fn get_subscription_links(link: &str) -> Result<Vec<String>> {
    debug!("fetching subscription from {link}");
    let client = reqwest::Client::builder()
        .timeout(SUBSCRIPTION_TIMEOUT)
        .build()?;
    let body = client
        .get(link)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    debug!("subscription body: {} bytes", body.len());

    match base64::decode_b64_text(&body) {
        Ok(decoded) => {
            let recurse: Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + '_>> =
                Box::pin(parse_links(&decoded));
            recurse.await
        }
        Err(_) => parse_clash(&body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_links_profiles_first() {
        let message = "vmess://AAA\ntrojan://u@h.example.com:443?x=1\n# comment";
        let links = parse_links(message).await.unwrap();
        assert_eq!(links, vec!["vmess://AAA", "trojan://u@h.example.com:443?x=1"]);
    }

    #[tokio::test]
    async fn test_parse_links_is_deterministic() {
        let message = "ssr://Zmlyc3Q\nvmess://c2Vjb25k";
        let first = parse_links(message).await.unwrap();
        let second = parse_links(message).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_parse_links_clash_document() {
        let doc = r#"
proxies:
  - {name: "n1", type: trojan, server: t.example.com, port: 443, password: p}
"#;
        let links = parse_links(doc).await.unwrap();
        assert_eq!(links.len(), 1);
        assert!(links[0].starts_with("trojan://"));
    }

    #[tokio::test]
    async fn test_parse_links_nothing_recognized() {
        assert!(matches!(
            parse_links("complete nonsense").await,
            Err(Error::NoProfileFound)
        ));
    }

    #[tokio::test]
    async fn test_parse_links_empty_message() {
        assert!(parse_links("").await.is_err());
    }
}
