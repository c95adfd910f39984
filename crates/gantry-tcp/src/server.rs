//! The TCP accept loop and the event bridge into the core.
//!
//! I/O runs on tokio tasks; the core stays single-threaded. The two sides
//! meet at plain-data channels: connection tasks push [`ClientEvent`]s in,
//! the host loop pushes responses back out through [`Transport::send`].

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use gantry_core::ClientId;
use gantry_wire as wire;

use crate::connection::handshake_acceptor;
use crate::framing::Framed;

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a fresh connection may dawdle before sending its
    /// `ConnectionRequest`.
    pub handshake_timeout: Duration,
    /// Capacity of the inbound event channel.
    pub event_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            event_buffer: 256,
        }
    }
}

impl ServerConfig {
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }
}

/// Something a connection task wants the host loop to know.
#[derive(Debug)]
pub enum ClientEvent {
    /// Handshake completed.
    Connected { client: ClientId, name: String },
    /// One decoded request frame.
    Request {
        client: ClientId,
        request: wire::Request,
    },
    /// The connection is gone; the core should drop the client's state.
    Disconnected { client: ClientId },
}

type WriterMap = Arc<Mutex<HashMap<ClientId, mpsc::UnboundedSender<wire::Response>>>>;

/// A bound listener with its accept loop running in the background.
pub struct Transport {
    local_addr: SocketAddr,
    events_rx: mpsc::Receiver<ClientEvent>,
    writers: WriterMap,
}

impl Transport {
    /// Bind and start accepting connections.
    pub async fn bind(addr: impl ToSocketAddrs, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer);
        let writers: WriterMap = Arc::default();

        tokio::spawn(accept_loop(
            listener,
            config,
            events_tx,
            Arc::clone(&writers),
        ));

        info!(%local_addr, "listening");
        Ok(Self {
            local_addr,
            events_rx,
            writers,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the next event. `None` once every connection task is gone
    /// and the accept loop has stopped.
    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events_rx.recv().await
    }

    /// Queue a response for a client's writer task. A response for a client
    /// that already disconnected is silently dropped.
    pub async fn send(&self, client: ClientId, response: wire::Response) {
        let writers = self.writers.lock().await;
        if let Some(tx) = writers.get(&client) {
            let _ = tx.send(response);
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: ServerConfig,
    events_tx: mpsc::Sender<ClientEvent>,
    writers: WriterMap,
) {
    let mut next_client = 1u64;
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(error = %err, "accept failed");
                continue;
            }
        };
        let client = ClientId::new(next_client);
        next_client += 1;

        tokio::spawn(run_connection(
            stream,
            peer,
            client,
            config.handshake_timeout,
            events_tx.clone(),
            Arc::clone(&writers),
        ));
    }
}

async fn run_connection(
    stream: TcpStream,
    peer: SocketAddr,
    client: ClientId,
    handshake_timeout: Duration,
    events_tx: mpsc::Sender<ClientEvent>,
    writers: WriterMap,
) {
    let mut io = Framed::new(stream);
    let name = match handshake_acceptor(&mut io, client, handshake_timeout).await {
        Ok(name) => name,
        Err(err) => {
            debug!(%client, %peer, error = %err, "handshake failed");
            return;
        }
    };
    info!(%client, %peer, name = %name, "client connected");

    if events_tx
        .send(ClientEvent::Connected {
            client,
            name,
        })
        .await
        .is_err()
    {
        return;
    }

    // Split into halves, carrying over anything the client pipelined
    // behind its connection request.
    let (stream, leftover) = io.into_parts();
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = Framed::from_parts(read_half, leftover);
    let mut writer = Framed::new(write_half);

    let (response_tx, mut response_rx) = mpsc::unbounded_channel::<wire::Response>();
    writers.lock().await.insert(client, response_tx);

    let write_task = tokio::spawn(async move {
        while let Some(response) = response_rx.recv().await {
            if writer.send(&response).await.is_err() {
                break;
            }
        }
    });

    loop {
        match reader.recv::<wire::Request>().await {
            Ok(Some(request)) => {
                if events_tx
                    .send(ClientEvent::Request { client, request })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(%client, error = %err, "read error");
                break;
            }
        }
    }

    writers.lock().await.remove(&client);
    write_task.abort();
    let _ = events_tx.send(ClientEvent::Disconnected { client }).await;
    info!(%client, "client disconnected");
}

/// Drive a core server from transport events and a fixed tick interval.
///
/// The core is not `Send`; run this future on a current-thread runtime or
/// inside a `LocalSet`. Returns when the transport produces no more events.
pub async fn serve(mut transport: Transport, mut server: gantry_core::Server, tick: Duration) {
    let mut ticker = tokio::time::interval(tick);
    loop {
        tokio::select! {
            event = transport.next_event() => match event {
                Some(ClientEvent::Connected { .. }) => {}
                Some(ClientEvent::Request { client, request }) => {
                    server.submit(client, request);
                }
                Some(ClientEvent::Disconnected { client }) => {
                    server.disconnect(client);
                }
                None => break,
            },
            _ = ticker.tick() => {
                server.tick();
                for (client, response) in server.drain_responses() {
                    transport.send(client, response).await;
                }
            }
        }
    }
}
