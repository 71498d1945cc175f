//! Profile-line extraction
//!
//! Pulls every share link out of free-form text. The pattern is
//! deliberately loose about what surrounds a link (comments, prose,
//! decorations) and strict about the link shapes themselves.

use std::sync::LazyLock;

use regex::Regex;

/// One alternation per accepted shape:
/// - `vmess://` base64 blob with an optional `?`/`#` tail
/// - `ssr://` base64 blob
/// - `vless` / `ss` / `trojan` URL form with a 2-5 digit port and a tail
/// - `ss://` base64 blob with a tail
static PROFILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"((?i)vmess://[a-zA-Z0-9+_/=-]+([?#][^\s]+)?)|((?i)ssr://[a-zA-Z0-9+_/=-]+)|((?i)(vless|ss|trojan)://(\S+?)@(\S+?):([0-9]{2,5})([?#][^\s]+))|((?i)(ss)://[a-zA-Z0-9+_/=-]+([?#][^\s]+))",
    )
    .expect("profile pattern must compile")
});

/// Extracts all profile links from the input, in input order.
pub fn parse_profiles(data: &str) -> Vec<String> {
    PROFILE_RE
        .find_iter(data)
        .map(|m| m.as_str().to_string())
        .collect()
}
