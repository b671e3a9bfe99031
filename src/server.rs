use anyhow::{Context, Result};
use futures_util::SinkExt;
use std::sync::{Arc, Mutex};
use tokio::{
    net::TcpStream,
    runtime::{Handle, RuntimeFlavor},
    task,
};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
        http::StatusCode,
    },
};
use tracing::{info, warn};

use crate::resolver::{PeerRequest, resolve_client_address};
use crate::security::is_client_ip_allowed;

/// Loopback clients trigger a blocking host name lookup; keep it off the
/// worker thread when the runtime allows it.
fn resolve_peer(request: &PeerRequest<'_, ()>) -> String {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => task::block_in_place(|| resolve_client_address(request)),
        _ => resolve_client_address(request),
    }
}

fn forbidden(reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = StatusCode::FORBIDDEN;
    response
}

/// Accepts a WebSocket handshake, gates it on the allow-list and replies with the resolved client IP.
#[tracing::instrument(skip(stream, allow_list), fields(peer_addr = tracing::field::Empty))]
pub async fn handle_connection(stream: TcpStream, allow_list: Option<&[String]>) -> Result<()> {
    let peer_addr = stream
        .peer_addr()
        .context("Failed to get peer address of incoming connection")?;
    tracing::Span::current().record("peer_addr", tracing::field::display(peer_addr));

    let client_ip = Arc::new(Mutex::new(String::new()));
    let client_ip_clone = client_ip.clone();

    let callback = move |req: &Request, response: Response| {
        let resolved = resolve_peer(&PeerRequest::new(req, peer_addr));

        if !is_client_ip_allowed(&resolved, allow_list) {
            warn!(client_ip = %resolved, "Rejecting client not on allow-list");
            return Err(forbidden("Client IP not allowed"));
        }

        if let Ok(mut guard) = client_ip_clone.lock() {
            *guard = resolved;
        }
        Ok(response)
    };

    let mut ws_stream = accept_hdr_async(stream, callback)
        .await
        .context("Failed to perform WebSocket handshake")?;

    let client_ip = client_ip
        .lock()
        .map(|guard| guard.clone())
        .unwrap_or_default();

    info!(client_ip = %client_ip, "Resolved client address");

    ws_stream
        .send(Message::Text(client_ip.into()))
        .await
        .context("Failed to send client address")?;
    ws_stream
        .close(None)
        .await
        .context("Failed to close WebSocket connection")?;

    Ok(())
}
