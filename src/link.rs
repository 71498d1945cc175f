//! Proxy link helpers
//!
//! A profile is an opaque share link in one of the supported schemes
//! (`vmess://`, `vless://`, `ss://`, `ssr://`, `trojan://`). This module
//! provides the small amount of interpretation the engine itself needs:
//! display metadata (protocol + remarks), the endpoint address for the
//! default prober, and the `^display-name` suffix convention.

use tracing::trace;
use url::Url;

use crate::error::{Error, Result};
use crate::parser::base64::decode_b64_text;

/// Link schemes accepted by the engine.
pub const SCHEMES: [&str; 5] = ["vmess://", "vless://", "ss://", "ssr://", "trojan://"];

/// Checks whether the input is a single absolute http(s) URL.
///
/// Multi-line input is never a URL even when the first line looks like
/// one; `Url::parse` would silently strip embedded newlines.
pub fn is_url(s: &str) -> bool {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(trimmed) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

/// Strips the `^display-name` suffix a caller may append to a link.
pub fn strip_display_name(link: &str) -> &str {
    link.splitn(2, '^').next().unwrap_or(link)
}

/// Returns the scheme of a link, lowercased, without the `://` separator.
pub fn scheme(link: &str) -> Option<String> {
    link.split_once("://").map(|(s, _)| s.to_ascii_lowercase())
}

/// Extracts `(protocol, remarks)` display metadata from a share link.
///
/// Remarks may legitimately be empty; callers substitute a positional
/// default. Unknown schemes are an error so that callers can fall back
/// to a bare protocol label.
pub fn get_remarks(link: &str) -> Result<(String, String)> {
    let scheme = scheme(link).ok_or_else(|| Error::UnrecognizedLink(link.to_string()))?;
    let remarks = match scheme.as_str() {
        "vmess" => vmess_remarks(link)?,
        "ssr" => ssr_remarks(link)?,
        "vless" | "trojan" => fragment_remarks(link),
        "ss" => ss_remarks(link),
        _ => return Err(Error::UnrecognizedLink(link.to_string())),
    };
    Ok((scheme, remarks))
}

/// Resolves the `host:port` endpoint a link points at.
pub fn endpoint(link: &str) -> Result<(String, u16)> {
    let scheme = scheme(link).ok_or_else(|| Error::UnrecognizedLink(link.to_string()))?;
    match scheme.as_str() {
        "vmess" => vmess_endpoint(link),
        "ssr" => ssr_endpoint(link),
        "vless" | "trojan" => url_endpoint(link),
        "ss" => {
            if link.contains('@') {
                url_endpoint(link)
            } else {
                ss_legacy_endpoint(link)
            }
        }
        _ => Err(Error::UnrecognizedLink(link.to_string())),
    }
}

// ============================================================================
// Per-scheme extraction
// ============================================================================

/// Base64 payload of a link, with any `?` / `#` tail removed.
fn payload(link: &str) -> &str {
    let body = link.split_once("://").map(|(_, b)| b).unwrap_or(link);
    body.split(['?', '#']).next().unwrap_or(body)
}

fn vmess_json(link: &str) -> Result<serde_json::Value> {
    let decoded = decode_b64_text(payload(link))?;
    Ok(serde_json::from_str(&decoded)?)
}

fn vmess_remarks(link: &str) -> Result<String> {
    let json = vmess_json(link)?;
    Ok(json
        .get("ps")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string())
}

fn vmess_endpoint(link: &str) -> Result<(String, u16)> {
    let json = vmess_json(link)?;
    let host = json
        .get("add")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::UnrecognizedLink(link.to_string()))?
        .to_string();
    // "port" appears both as a number and as a quoted string in the wild
    let port = match json.get("port") {
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0) as u16,
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    };
    if port == 0 {
        return Err(Error::UnrecognizedLink(link.to_string()));
    }
    Ok((host, port))
}

/// SSR body: `host:port:protocol:method:obfs:b64(password)/?params` where
/// `remarks` and the obfs/protocol params are themselves base64.
fn ssr_remarks(link: &str) -> Result<String> {
    let decoded = decode_b64_text(payload(link))?;
    let query = decoded.split_once("/?").map(|(_, q)| q).unwrap_or("");
    for pair in query.split('&') {
        if let Some((key, value)) = pair.split_once('=')
            && key == "remarks"
        {
            return Ok(decode_b64_text(value).unwrap_or_default());
        }
    }
    Ok(String::new())
}

fn ssr_endpoint(link: &str) -> Result<(String, u16)> {
    let decoded = decode_b64_text(payload(link))?;
    let body = decoded.split_once("/?").map(|(b, _)| b).unwrap_or(&decoded);
    let mut parts = body.split(':');
    let host = parts.next().unwrap_or_default().to_string();
    let port: u16 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::UnrecognizedLink(link.to_string()))?;
    if host.is_empty() {
        return Err(Error::UnrecognizedLink(link.to_string()));
    }
    Ok((host, port))
}

/// Percent-decoded URL fragment, the conventional tag position.
fn fragment_remarks(link: &str) -> String {
    let Ok(url) = Url::parse(link) else {
        return String::new();
    };
    url.fragment()
        .map(|f| {
            urlencoding::decode(f)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| f.to_string())
        })
        .unwrap_or_default()
}

fn ss_remarks(link: &str) -> String {
    // SIP002 form carries a userinfo section; the legacy form is one
    // base64 blob. Both keep the tag in the fragment.
    if link.contains('@') {
        fragment_remarks(link)
    } else {
        link.split_once('#')
            .map(|(_, f)| {
                urlencoding::decode(f)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| f.to_string())
            })
            .unwrap_or_default()
    }
}

fn url_endpoint(link: &str) -> Result<(String, u16)> {
    let url = Url::parse(link).map_err(|_| Error::UnrecognizedLink(link.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::UnrecognizedLink(link.to_string()))?
        .to_string();
    let port = url
        .port()
        .ok_or_else(|| Error::UnrecognizedLink(link.to_string()))?;
    Ok((host, port))
}

/// Legacy `ss://b64(method:password@host:port)#tag`.
fn ss_legacy_endpoint(link: &str) -> Result<(String, u16)> {
    let decoded = decode_b64_text(payload(link))?;
    trace!("decoded legacy ss body: {decoded}");
    let endpoint = decoded
        .rsplit_once('@')
        .map(|(_, e)| e)
        .ok_or_else(|| Error::UnrecognizedLink(link.to_string()))?;
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| Error::UnrecognizedLink(link.to_string()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| Error::UnrecognizedLink(link.to_string()))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn vmess_link(ps: &str, add: &str, port: u16) -> String {
        let json = serde_json::json!({
            "v": "2", "ps": ps, "add": add, "port": port, "id": "uuid", "aid": 0
        });
        format!("vmess://{}", STANDARD.encode(json.to_string()))
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/sub"));
        assert!(is_url("  http://example.com  "));
        assert!(!is_url("vmess://abcd"));
        assert!(!is_url("https://example.com/sub\nvmess://abcd"));
        assert!(!is_url("not a url"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_strip_display_name() {
        assert_eq!(strip_display_name("vmess://abc^My Node"), "vmess://abc");
        assert_eq!(strip_display_name("vmess://abc"), "vmess://abc");
    }

    #[test]
    fn test_vmess_remarks_and_endpoint() {
        let link = vmess_link("Tokyo 01", "jp.example.com", 443);
        let (protocol, remarks) = get_remarks(&link).unwrap();
        assert_eq!(protocol, "vmess");
        assert_eq!(remarks, "Tokyo 01");
        assert_eq!(
            endpoint(&link).unwrap(),
            ("jp.example.com".to_string(), 443)
        );
    }

    #[test]
    fn test_vmess_string_port() {
        let json = r#"{"ps":"n","add":"h.example.com","port":"8443","id":"u"}"#;
        let link = format!("vmess://{}", STANDARD.encode(json));
        assert_eq!(endpoint(&link).unwrap(), ("h.example.com".to_string(), 8443));
    }

    #[test]
    fn test_trojan_fragment_remarks() {
        let link = "trojan://pwd@example.com:443?sni=example.com#HK%2001";
        let (protocol, remarks) = get_remarks(link).unwrap();
        assert_eq!(protocol, "trojan");
        assert_eq!(remarks, "HK 01");
        assert_eq!(endpoint(link).unwrap(), ("example.com".to_string(), 443));
    }

    #[test]
    fn test_ssr_remarks() {
        let name_b64 = STANDARD.encode("SG Node");
        let body = format!(
            "sg.example.com:8388:origin:aes-256-cfb:plain:{}/?remarks={}",
            STANDARD.encode("secret"),
            name_b64
        );
        let link = format!("ssr://{}", STANDARD.encode(body));
        let (protocol, remarks) = get_remarks(&link).unwrap();
        assert_eq!(protocol, "ssr");
        assert_eq!(remarks, "SG Node");
        assert_eq!(
            endpoint(&link).unwrap(),
            ("sg.example.com".to_string(), 8388)
        );
    }

    #[test]
    fn test_ss_legacy_form() {
        let body = STANDARD.encode("aes-256-gcm:password@ss.example.com:8388");
        let link = format!("ss://{}#US%20West", body);
        let (protocol, remarks) = get_remarks(&link).unwrap();
        assert_eq!(protocol, "ss");
        assert_eq!(remarks, "US West");
        assert_eq!(
            endpoint(&link).unwrap(),
            ("ss.example.com".to_string(), 8388)
        );
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        assert!(get_remarks("socks5://host:1080").is_err());
        assert!(get_remarks("plain text").is_err());
        assert!(endpoint("ftp://host:21").is_err());
    }

    #[test]
    fn test_missing_remarks_is_empty_not_error() {
        let link = vmess_link("", "h.example.com", 443);
        let (_, remarks) = get_remarks(&link).unwrap();
        assert!(remarks.is_empty());
    }
}
