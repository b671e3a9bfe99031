use anyhow::{Context, Result};
use ip_gate::{DEFAULT_CONFIG_FILE, handle_connection, load_config, load_ip_allow_list};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let config = load_config(&config_file)?;
    info!(
        config_file = %config_file,
        listen_ip = %config.listen.ip,
        listen_port = config.listen.port,
        "Configuration loaded"
    );

    let allow_list = Arc::new(load_ip_allow_list(&config));
    match allow_list.as_deref() {
        Some(ips) => info!(allowed_ips = ?ips, "IP allow-list enabled"),
        None => info!("No IP allow-list configured, accepting all clients"),
    }

    let addr = format!("{}:{}", config.listen.ip, config.listen.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {addr}"))?;

    info!(listen_addr = %addr, "IP gate listening");

    while let Ok((stream, addr)) = listener.accept().await {
        let allow_list = allow_list.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, allow_list.as_deref()).await {
                error!(client_addr = %addr, error = %format!("{e:#}"), "Connection failed");
            }
        });
    }

    Ok(())
}
