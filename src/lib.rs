//! IP Gate
//!
//! Resolves the originating client IP of a request that may have passed through
//! reverse proxies (`x-forwarded-for`, `Proxy-Client-IP`, `WL-Proxy-Client-IP`),
//! validates IPv4 addresses and loads an IP allow-list from configuration.
//! A small WebSocket server gates handshakes on that allow-list.

pub mod config;
pub mod resolver;
pub mod security;
pub mod server;

// Re-export commonly used types and functions
pub use config::{
    Config, DEFAULT_CONFIG_FILE, IP_ALLOW_LIST_KEY, ListenConfig, PropertySource, load_config,
    parse_config,
};
pub use resolver::{
    ClientRequest, FORWARDING_HEADERS, LocalHost, PeerRequest, SystemLocalHost,
    resolve_client_address, resolve_client_address_with,
};
pub use security::{is_client_ip_allowed, is_valid_ipv4, load_ip_allow_list};
pub use server::handle_connection;
