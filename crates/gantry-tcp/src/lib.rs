#![deny(unsafe_code)]

//! Length-prefixed framed TCP transport for the gantry RPC server.
//!
//! Frames are `varint(length) || message_bytes`. The transport owns the
//! accept loop and per-connection I/O tasks and exchanges plain requests
//! and responses with the single-threaded core through channels; see
//! [`serve`] for the glue loop.

pub mod connection;
pub mod framing;
pub mod server;

pub use connection::{handshake_acceptor, handshake_initiator, ConnectionError};
pub use framing::Framed;
pub use server::{serve, ClientEvent, ServerConfig, Transport};
