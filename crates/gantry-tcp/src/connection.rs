//! Connection handshake.
//!
//! Immediately after the TCP connection is established the client sends a
//! framed `ConnectionRequest`; the server answers with a
//! `ConnectionResponse` carrying its verdict and, on success, the assigned
//! client identifier. Everything after that is Request/Response frames.

use std::time::Duration;

use tracing::debug;

use tokio::io::{AsyncRead, AsyncWrite};

use gantry_core::ClientId;
use gantry_wire::{ConnectionRequest, ConnectionResponse, ConnectionStatus};

use crate::framing::Framed;

/// Error during connection establishment or I/O.
#[derive(Debug)]
pub enum ConnectionError {
    /// IO error.
    Io(std::io::Error),
    /// The peer rejected or botched the handshake.
    Handshake(String),
    /// Connection closed before the exchange finished.
    Closed,
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e)
    }
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Io(e) => write!(f, "io error: {e}"),
            ConnectionError::Handshake(reason) => write!(f, "handshake failed: {reason}"),
            ConnectionError::Closed => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// Server side of the handshake.
///
/// On success returns the client's self-reported name. On failure a refusal
/// is sent best-effort before the error is returned; the caller drops the
/// connection either way.
pub async fn handshake_acceptor<S: AsyncRead + AsyncWrite + Unpin>(
    io: &mut Framed<S>,
    client: ClientId,
    timeout: Duration,
) -> Result<String, ConnectionError> {
    let request: Option<ConnectionRequest> = match io.recv_timeout(timeout).await {
        Ok(request) => request,
        Err(err) => {
            refuse(io, ConnectionStatus::MalformedRequest, &err.to_string()).await;
            return Err(ConnectionError::Handshake(err.to_string()));
        }
    };

    let Some(request) = request else {
        refuse(io, ConnectionStatus::Timeout, "no connection request received").await;
        return Err(ConnectionError::Handshake(
            "no connection request received".into(),
        ));
    };

    io.send(&ConnectionResponse {
        status: ConnectionStatus::Ok as i32,
        message: String::new(),
        client_identifier: client.raw(),
    })
    .await?;

    Ok(request.client_name)
}

async fn refuse<S: AsyncRead + AsyncWrite + Unpin>(
    io: &mut Framed<S>,
    status: ConnectionStatus,
    message: &str,
) {
    debug!(?status, message, "refusing connection");
    let refusal = ConnectionResponse {
        status: status as i32,
        message: message.to_owned(),
        client_identifier: 0,
    };
    // The connection is being dropped anyway; a failed refusal changes
    // nothing.
    let _ = io.send(&refusal).await;
}

/// Client side of the handshake. Returns the server-assigned client id.
pub async fn handshake_initiator<S: AsyncRead + AsyncWrite + Unpin>(
    io: &mut Framed<S>,
    client_name: &str,
) -> Result<ClientId, ConnectionError> {
    io.send(&ConnectionRequest {
        client_name: client_name.to_owned(),
    })
    .await?;

    let response: ConnectionResponse = io.recv().await?.ok_or(ConnectionError::Closed)?;
    match ConnectionStatus::try_from(response.status) {
        Ok(ConnectionStatus::Ok) => Ok(ClientId::new(response.client_identifier)),
        _ => Err(ConnectionError::Handshake(response.message)),
    }
}
