use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, error, warn};

use crate::config::{IP_ALLOW_LIST_KEY, PropertySource};

/// Dotted-quad IPv4: first octet 1-255, remaining octets 0-255, no leading zeros.
static IPV4_PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[1-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])(?:\.(?:[0-9]|[1-9][0-9]|1[0-9]{2}|2[0-4][0-9]|25[0-5])){3}$",
    )
});

/// Checks whether `ip` is a syntactically valid dotted-quad IPv4 address.
///
/// Accepts either a `&str` or an `Option<&str>`; `None` and the empty string
/// are never valid. The first octet may not be zero.
#[must_use]
pub fn is_valid_ipv4<'a>(ip: impl Into<Option<&'a str>>) -> bool {
    let Some(ip) = ip.into().filter(|ip| !ip.is_empty()) else {
        return false;
    };

    match &*IPV4_PATTERN {
        Ok(pattern) => pattern.is_match(ip),
        Err(e) => {
            error!(error = %e, "IPv4 pattern failed to compile");
            false
        }
    }
}

/// Reads the `ipWhiteList` property and keeps the entries that are valid IPv4 addresses.
///
/// Returns `None` when the property is missing or blank, and also when no
/// entry survives validation. Order and duplicates are preserved; entries are
/// not trimmed.
#[must_use]
pub fn load_ip_allow_list(properties: &impl PropertySource) -> Option<Vec<String>> {
    let Some(raw) = properties
        .property(IP_ALLOW_LIST_KEY)
        .filter(|value| !value.trim().is_empty())
    else {
        warn!(key = IP_ALLOW_LIST_KEY, "Cannot get allow-list property");
        return None;
    };

    let allow_list: Vec<String> = raw
        .split(',')
        .filter(|entry| {
            let valid = is_valid_ipv4(*entry);
            if !valid {
                debug!(entry = %entry, "Dropping invalid allow-list entry");
            }
            valid
        })
        .map(str::to_string)
        .collect();

    if allow_list.is_empty() {
        None
    } else {
        Some(allow_list)
    }
}

/// Checks if a resolved client IP is allowed by the configured allow-list.
/// Returns true if no allow-list is configured (allow all) or if the IP is listed exactly.
#[must_use]
pub fn is_client_ip_allowed(client_ip: &str, allow_list: Option<&[String]>) -> bool {
    let Some(allow_list) = allow_list else {
        return true; // No restrictions configured
    };

    !client_ip.is_empty() && allow_list.iter().any(|allowed| allowed == client_ip)
}
