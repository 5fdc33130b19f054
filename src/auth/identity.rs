//! Identity resolution from trusted SSO proxy headers.
//!
//! The gateway performs no credential verification of its own: the SSO
//! proxy in front of it authenticates the caller and injects user and
//! group headers, and those headers are trusted as-is. That makes header
//! spoofing trivial for anyone who can reach the gateway directly, so the
//! gateway must only ever be reachable through the proxy.

use http::HeaderMap;

use crate::config::GatewayConfig;

/// Who is making the request.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Opaque user name from the user header. Empty when the header is
    /// absent; an anonymous caller is a valid mode.
    pub user: String,

    /// Group memberships from the group header, order preserved.
    pub groups: Vec<String>,
}

/// Resolve the caller's identity from the configured headers.
///
/// Never fails. A missing user header yields an empty user name, a missing
/// group header yields the configured anonymous group, and a malformed
/// group header yields an empty group list. Policy evaluation decides what
/// any of those are allowed to do.
pub fn resolve(headers: &HeaderMap, config: &GatewayConfig) -> Identity {
    let user = headers
        .get(&config.user_header_name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let groups = match headers.get(&config.group_header_name) {
        None => vec![config.anonymous_group.clone()],
        Some(value) => {
            let raw = value.to_str().unwrap_or_default();
            match config.group_header_type.as_str() {
                "AD" => parse_ad_groups(raw),
                "space-delimited" => raw.split(' ').map(str::to_string).collect(),
                _ => vec![config.anonymous_group.clone()],
            }
        }
    };

    Identity { user, groups }
}

/// Parse an Active Directory distinguished-name style group header.
///
/// The value is a comma-separated list of key=value pairs, with semicolons
/// as a secondary separator inside each pair. Tokens starting with `CN=`
/// contribute one group, lowercased; other tokens (`OU=`, `DC=`, ...) are
/// ignored.
fn parse_ad_groups(raw: &str) -> Vec<String> {
    let mut groups = Vec::new();
    for pair in raw.split(',') {
        for token in pair.split(';') {
            if let Some(name) = token.strip_prefix("CN=") {
                groups.push(name.to_lowercase());
            }
        }
    }
    groups
}
