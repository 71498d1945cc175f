//! Clash proxy configuration
//!
//! Typed view of the `proxies:` section of a clash document, plus the
//! conversion of each descriptor into its share-link form. Only the five
//! schemes the engine tests are materialized; other proxy types are
//! skipped so that one exotic entry never sinks a whole subscription.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;

// ============================================================================
// Document Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ClashDocument {
    #[serde(default)]
    proxies: Vec<serde_yaml::Value>,
}

/// One entry of the `proxies:` section, discriminated by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClashProxy {
    Ss(SsProxy),
    Ssr(SsrProxy),
    Vmess(VmessProxy),
    Vless(VlessProxy),
    Trojan(TrojanProxy),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SsProxy {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub cipher: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SsrProxy {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub cipher: String,
    pub password: String,
    pub protocol: String,
    pub obfs: String,
    #[serde(default, rename = "obfs-param")]
    pub obfs_param: String,
    #[serde(default, rename = "protocol-param")]
    pub protocol_param: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VmessProxy {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub uuid: String,
    #[serde(default, rename = "alterId")]
    pub alter_id: u32,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub tls: bool,
    #[serde(default, rename = "ws-opts")]
    pub ws_opts: Option<WsOpts>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsOpts {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VlessProxy {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub uuid: String,
    #[serde(default)]
    pub tls: bool,
    #[serde(default)]
    pub servername: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrojanProxy {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub password: String,
    #[serde(default)]
    pub sni: Option<String>,
}

// ============================================================================
// Document Parsing
// ============================================================================

/// Parses a clash YAML document and returns its proxies as share links.
///
/// Entries of unsupported types, or entries missing required fields, are
/// dropped with a warning.
pub fn parse_clash(data: &str) -> Result<Vec<String>> {
    let document: ClashDocument = serde_yaml::from_str(data)?;
    debug!("clash document with {} proxy entries", document.proxies.len());
    let links = document
        .proxies
        .into_iter()
        .filter_map(|value| match serde_yaml::from_value::<ClashProxy>(value) {
            Ok(proxy) => Some(proxy.to_link()),
            Err(e) => {
                warn!("skipping unsupported clash proxy entry: {e}");
                None
            }
        })
        .collect();
    Ok(links)
}

/// Minimal shape every proxy entry must have; used to validate single
/// lines during streaming scans.
#[derive(Debug, Clone, Deserialize)]
pub struct BaseProxy {
    pub name: String,
    pub server: String,
    pub port: u16,
}

/// Validates that one YAML line denotes a proxy entry
/// (`- {name: …, server: …, port: …, …}` in flow form).
pub fn parse_base_proxy(line: &str) -> Result<BaseProxy> {
    let trimmed = line.trim();
    let body = trimmed.strip_prefix("- ").unwrap_or(trimmed);
    Ok(serde_yaml::from_str(body)?)
}

// ============================================================================
// Share-link Conversion
// ============================================================================

impl ClashProxy {
    /// Canonical share link for this descriptor.
    pub fn to_link(&self) -> String {
        match self {
            ClashProxy::Ss(p) => p.to_link(),
            ClashProxy::Ssr(p) => p.to_link(),
            ClashProxy::Vmess(p) => p.to_link(),
            ClashProxy::Vless(p) => p.to_link(),
            ClashProxy::Trojan(p) => p.to_link(),
        }
    }
}

impl SsProxy {
    /// Legacy form: the whole `method:password@host:port` is one blob.
    fn to_link(&self) -> String {
        let body = format!(
            "{}:{}@{}:{}",
            self.cipher, self.password, self.server, self.port
        );
        format!(
            "ss://{}#{}",
            STANDARD.encode(body),
            urlencoding::encode(&self.name)
        )
    }
}

impl SsrProxy {
    fn to_link(&self) -> String {
        let body = format!(
            "{}:{}:{}:{}:{}:{}/?obfsparam={}&protoparam={}&remarks={}",
            self.server,
            self.port,
            self.protocol,
            self.cipher,
            self.obfs,
            URL_SAFE_NO_PAD.encode(&self.password),
            URL_SAFE_NO_PAD.encode(&self.obfs_param),
            URL_SAFE_NO_PAD.encode(&self.protocol_param),
            URL_SAFE_NO_PAD.encode(&self.name),
        );
        format!("ssr://{}", URL_SAFE_NO_PAD.encode(body))
    }
}

impl VmessProxy {
    fn to_link(&self) -> String {
        let (host, path) = match &self.ws_opts {
            Some(opts) => (
                opts.headers.get("Host").cloned().unwrap_or_default(),
                opts.path.clone().unwrap_or_default(),
            ),
            None => (String::new(), String::new()),
        };
        let network = self.network.clone().unwrap_or_else(|| "tcp".to_string());
        let tls = if self.tls { "tls" } else { "" };
        let json = serde_json::json!({
            "v": "2",
            "ps": self.name,
            "add": self.server,
            "port": self.port,
            "id": self.uuid,
            "aid": self.alter_id,
            "net": network,
            "type": "none",
            "host": host,
            "path": path,
            "tls": tls,
        });
        format!("vmess://{}", STANDARD.encode(json.to_string()))
    }
}

impl VlessProxy {
    fn to_link(&self) -> String {
        let mut query = String::from("encryption=none");
        if self.tls {
            query.push_str("&security=tls");
        }
        if let Some(sni) = &self.servername {
            query.push_str("&sni=");
            query.push_str(&urlencoding::encode(sni));
        }
        if let Some(network) = &self.network {
            query.push_str("&type=");
            query.push_str(&urlencoding::encode(network));
        }
        format!(
            "vless://{}@{}:{}?{}#{}",
            self.uuid,
            self.server,
            self.port,
            query,
            urlencoding::encode(&self.name)
        )
    }
}

impl TrojanProxy {
    fn to_link(&self) -> String {
        let mut query = String::new();
        if let Some(sni) = &self.sni {
            query.push_str("sni=");
            query.push_str(&urlencoding::encode(sni));
        }
        let separator = if query.is_empty() { "" } else { "?" };
        format!(
            "trojan://{}@{}:{}{}{}#{}",
            urlencoding::encode(&self.password),
            self.server,
            self.port,
            separator,
            query,
            urlencoding::encode(&self.name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASH_DOC: &str = r#"
port: 7890
mode: rule
proxies:
  - {name: "SS Node", type: ss, server: ss.example.com, port: 8388, cipher: aes-256-gcm, password: pass1}
  - {name: "Vmess Node", type: vmess, server: vm.example.com, port: 443, uuid: 0fb4f383-1c4c-4c4c-9d61-2f6b4338fb90, alterId: 0, tls: true}
  - {name: "Trojan Node", type: trojan, server: tr.example.com, port: 443, password: pw, sni: tr.example.com}
proxy-groups:
  - {name: auto, type: url-test, proxies: [SS Node]}
"#;

    #[test]
    fn test_parse_clash_document() {
        let links = parse_clash(CLASH_DOC).unwrap();
        assert_eq!(links.len(), 3);
        assert!(links[0].starts_with("ss://"));
        assert!(links[1].starts_with("vmess://"));
        assert!(links[2].starts_with("trojan://"));
    }

    #[test]
    fn test_parse_clash_skips_unknown_types() {
        let doc = r#"
proxies:
  - {name: "known", type: ss, server: a.example.com, port: 1234, cipher: aes-128-gcm, password: x}
  - {name: "exotic", type: snell, server: b.example.com, port: 4321, psk: y}
"#;
        let links = parse_clash(doc).unwrap();
        assert_eq!(links.len(), 1);
        assert!(links[0].starts_with("ss://"));
    }

    #[test]
    fn test_parse_clash_rejects_non_yaml() {
        assert!(parse_clash("vmess://AAAA").is_err());
    }

    #[test]
    fn test_parse_clash_empty_document() {
        let links = parse_clash("port: 7890\nmode: rule\n").unwrap();
        assert!(links.is_empty());
    }

    #[test]
    fn test_vmess_link_round_trips_through_remarks() {
        let doc = r#"
proxies:
  - {name: "JP 01", type: vmess, server: jp.example.com, port: 443, uuid: abcd, alterId: 2}
"#;
        let links = parse_clash(doc).unwrap();
        let (protocol, remarks) = crate::link::get_remarks(&links[0]).unwrap();
        assert_eq!(protocol, "vmess");
        assert_eq!(remarks, "JP 01");
        assert_eq!(
            crate::link::endpoint(&links[0]).unwrap(),
            ("jp.example.com".to_string(), 443)
        );
    }

    #[test]
    fn test_ssr_link_round_trips_through_remarks() {
        let doc = r#"
proxies:
  - {name: "SG 02", type: ssr, server: sg.example.com, port: 8388, cipher: aes-256-cfb, password: pw, protocol: origin, obfs: plain}
"#;
        let links = parse_clash(doc).unwrap();
        assert!(links[0].starts_with("ssr://"));
        let (protocol, remarks) = crate::link::get_remarks(&links[0]).unwrap();
        assert_eq!(protocol, "ssr");
        assert_eq!(remarks, "SG 02");
    }

    #[test]
    fn test_parse_base_proxy() {
        let proxy = parse_base_proxy(
            "- {name: n1, type: ss, server: s.example.com, port: 443, cipher: aes-128-gcm, password: p}",
        )
        .unwrap();
        assert_eq!(proxy.name, "n1");
        assert_eq!(proxy.server, "s.example.com");
        assert_eq!(proxy.port, 443);
    }

    #[test]
    fn test_parse_base_proxy_rejects_decoration() {
        assert!(parse_base_proxy("# a comment").is_err());
        assert!(parse_base_proxy("proxies:").is_err());
        assert!(parse_base_proxy("- name: block-style-start").is_err());
    }
}
