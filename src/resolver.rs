//! Client address resolution for requests that may have passed through reverse proxies.

use anyhow::{Context, Result, anyhow};
use std::{
    borrow::Cow,
    net::{SocketAddr, ToSocketAddrs},
};
use tracing::error;

use crate::security::is_valid_ipv4;

/// Headers consulted, in order, before falling back to the peer address.
pub const FORWARDING_HEADERS: [&str; 3] =
    ["x-forwarded-for", "Proxy-Client-IP", "WL-Proxy-Client-IP"];

const LOOPBACK: &str = "127.0.0.1";

/// The parts of an incoming request the resolver needs.
pub trait ClientRequest {
    /// Value of the named header, if present.
    fn header(&self, name: &str) -> Option<Cow<'_, str>>;

    /// Transport-level peer IP, without port.
    fn remote_addr(&self) -> Option<String>;
}

/// An `http::Request` paired with the socket address it arrived from.
pub struct PeerRequest<'a, B> {
    pub request: &'a http::Request<B>,
    pub peer_addr: Option<SocketAddr>,
}

impl<'a, B> PeerRequest<'a, B> {
    pub fn new(request: &'a http::Request<B>, peer_addr: SocketAddr) -> Self {
        Self {
            request,
            peer_addr: Some(peer_addr),
        }
    }
}

impl<B> ClientRequest for PeerRequest<'_, B> {
    /// Header bytes outside visible ASCII are decoded as ISO-8859-1.
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        let value = self.request.headers().get(name)?;
        Some(match value.to_str() {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => Cow::Owned(value.as_bytes().iter().map(|&b| char::from(b)).collect()),
        })
    }

    fn remote_addr(&self) -> Option<String> {
        self.peer_addr.map(|addr| addr.ip().to_string())
    }
}

/// Resolves the address of the machine this process runs on.
pub trait LocalHost {
    fn address(&self) -> Result<String>;
}

/// Looks up the system host name and resolves it, preferring IPv4.
pub struct SystemLocalHost;

impl LocalHost for SystemLocalHost {
    fn address(&self) -> Result<String> {
        let name = host_name()?;
        let addrs: Vec<SocketAddr> = (name.as_str(), 0)
            .to_socket_addrs()
            .with_context(|| format!("Failed to resolve local host name {name}"))?
            .collect();

        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .map(|addr| addr.ip().to_string())
            .ok_or_else(|| anyhow!("Local host name {name} resolved to no addresses"))
    }
}

#[cfg(unix)]
fn host_name() -> Result<String> {
    nix::unistd::gethostname()
        .context("Failed to read local host name")?
        .into_string()
        .map_err(|_| anyhow!("Local host name is not valid UTF-8"))
}

#[cfg(not(unix))]
fn host_name() -> Result<String> {
    Err(anyhow!("Reading the local host name is not supported on this platform"))
}

fn is_present(value: &str) -> bool {
    !value.is_empty() && !value.eq_ignore_ascii_case("unknown")
}

/// Resolves the originating client IP, or returns an empty string if none is valid.
///
/// See [`resolve_client_address_with`] for the precedence rules.
#[must_use]
pub fn resolve_client_address(request: &impl ClientRequest) -> String {
    resolve_client_address_with(request, &SystemLocalHost)
}

/// Resolves the originating client IP using `local_host` for loopback requests.
///
/// The first of [`FORWARDING_HEADERS`] that is non-empty and not `unknown` wins,
/// falling back to the peer address. Of a comma-separated hop list only the
/// first (untrimmed) segment is kept; a value whose only commas are trailing
/// is left whole and fails validation. `127.0.0.1` is replaced by the local
/// host's address; if that lookup fails the result is empty. Anything that is
/// not a valid IPv4 address also yields an empty string.
#[must_use]
pub fn resolve_client_address_with(
    request: &impl ClientRequest,
    local_host: &impl LocalHost,
) -> String {
    let mut ip = FORWARDING_HEADERS
        .iter()
        .find_map(|name| request.header(name).filter(|value| is_present(value)))
        .map(Cow::into_owned)
        .or_else(|| request.remote_addr())
        .unwrap_or_default();

    // Trailing empty segments do not count as hops.
    if ip.trim_end_matches(',').contains(',') {
        ip = ip.split(',').next().unwrap_or_default().to_string();
    }

    if ip == LOOPBACK {
        match local_host.address() {
            Ok(address) => ip = address,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to get local host address");
                return String::new();
            }
        }
    }

    if is_valid_ipv4(ip.as_str()) {
        ip
    } else {
        String::new()
    }
}
