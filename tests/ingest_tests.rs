//! Ingestion pipeline tests over the public API.
//!
//! Covers the parser chain end to end: pasted link blocks, base64 blobs,
//! clash YAML documents, local files, and the option-message shapes.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use proxybench::error::Error;
use proxybench::options::{SpeedTestMode, TestMode, parse_message, parse_options};
use proxybench::parse_links;

// ============================================================================
// Parser Chain
// ============================================================================

#[tokio::test]
async fn test_line_input_yields_links_in_order() {
    let message = "vmess://AAA\ntrojan://u@h.example.com:443?x=1\n# comment";
    let links = parse_links(message).await.unwrap();
    assert_eq!(
        links,
        vec![
            "vmess://AAA".to_string(),
            "trojan://u@h.example.com:443?x=1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_base64_input_matches_plain_input() {
    let plain = "vmess://AAA\ntrojan://u@h.example.com:443?x=1\n# comment";
    let encoded = STANDARD.encode(plain);
    let from_plain = parse_links(plain).await.unwrap();
    let from_encoded = parse_links(&encoded).await.unwrap();
    assert_eq!(from_plain, from_encoded);
}

#[tokio::test]
async fn test_clash_document_input() {
    let doc = r#"
port: 7890
proxies:
  - {name: "A", type: ss, server: a.example.com, port: 8388, cipher: aes-256-gcm, password: p}
  - {name: "B", type: vmess, server: b.example.com, port: 443, uuid: u, alterId: 0}
"#;
    let links = parse_links(doc).await.unwrap();
    assert_eq!(links.len(), 2);
    assert!(links[0].starts_with("ss://"));
    assert!(links[1].starts_with("vmess://"));
}

#[tokio::test]
async fn test_ingestion_is_deterministic() {
    let message = "ssr://Zmlyc3Q\nvmess://c2Vjb25k\nvless://u@h.example.com:8443#n";
    let first = parse_links(message).await.unwrap();
    for _ in 0..3 {
        assert_eq!(parse_links(message).await.unwrap(), first);
    }
}

#[tokio::test]
async fn test_unrecognized_input_fails() {
    assert!(matches!(
        parse_links("no profiles in here at all ???").await,
        Err(Error::NoProfileFound)
    ));
}

// ============================================================================
// File Inputs
// ============================================================================

#[tokio::test]
async fn test_file_with_base64_subscription() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("subscription.txt");
    let plain = "vmess://AAA\nvmess://BBB\n";
    tokio::fs::write(&path, STANDARD.encode(plain)).await.unwrap();
    let links = parse_links(path.to_str().unwrap()).await.unwrap();
    assert_eq!(links, vec!["vmess://AAA", "vmess://BBB"]);
}

#[tokio::test]
async fn test_yaml_file_streams_clash_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nodes.yaml");
    let doc = r#"port: 7890
proxies:
  - {name: "n1", type: trojan, server: t.example.com, port: 443, password: p}
  # decorative comment the scanner must skip
proxy-groups:
  - {name: auto, type: url-test}
"#;
    tokio::fs::write(&path, doc).await.unwrap();
    let links = parse_links(path.to_str().unwrap()).await.unwrap();
    assert_eq!(links.len(), 1);
    assert!(links[0].starts_with("trojan://"));
}

#[tokio::test]
async fn test_plain_profile_file_with_sniffed_preview() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.txt");
    let mut content = String::new();
    for i in 0..30 {
        content.push_str(&format!("trojan://u@node-{i}.example.com:443?x=1\n"));
    }
    tokio::fs::write(&path, &content).await.unwrap();
    let links = parse_links(path.to_str().unwrap()).await.unwrap();
    assert_eq!(links.len(), 30);
}

// ============================================================================
// Option Messages
// ============================================================================

#[test]
fn test_caret_options_full() {
    let options = parse_options("MyGroup^all^http^speed^_^4^30").unwrap();
    assert_eq!(options.group_name, "MyGroup");
    assert_eq!(options.speed_test_mode, SpeedTestMode::All);
    assert_eq!(options.concurrency, 4);
    assert_eq!(options.timeout, Duration::from_secs(30));
    assert_eq!(options.test_mode, TestMode::All);
}

#[test]
fn test_caret_options_clamped() {
    let options = parse_options("?empty?^all^_^_^_^0^5").unwrap();
    assert_eq!(options.group_name, "Default");
    assert_eq!(options.concurrency, 1);
    assert_eq!(options.timeout, Duration::from_secs(20));
}

#[tokio::test]
async fn test_json_message_feeds_subscription_to_ingestion() {
    let message = serde_json::json!({
        "group": "G",
        "testMode": 2,
        "concurrency": 3,
        "timeout": 12,
        "subscription": "vmess://AAA\nvmess://BBB"
    });
    let (links, options) = parse_message(message.to_string().as_bytes()).await.unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(options.concurrency, 3);
    assert_eq!(options.timeout, Duration::from_secs(12));
}

#[tokio::test]
async fn test_json_message_with_empty_subscription_fails() {
    let message = serde_json::json!({ "testMode": 2, "subscription": "" });
    assert!(parse_message(message.to_string().as_bytes()).await.is_err());
}

#[tokio::test]
async fn test_json_message_garbage_is_invalid() {
    assert!(parse_message(b"^^not json^^").await.is_err());
}
