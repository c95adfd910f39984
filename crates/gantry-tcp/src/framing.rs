//! Varint length-prefixed framing for async byte streams.
//!
//! Generic over the transport: anything `AsyncRead` / `AsyncWrite` works,
//! including `TcpStream`, Unix sockets, and the in-memory duplex streams
//! used in tests. Read and write sides are independent, so a stream can be
//! split into halves and wrapped separately.

use std::io;

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use gantry_wire::frame::{self, Scan};

const READ_CHUNK: usize = 4096;

/// A framed connection over an async byte stream.
pub struct Framed<S> {
    stream: S,
    buf: Vec<u8>,
}

impl<S> Framed<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    /// Rewrap a stream together with bytes already read past the previous
    /// frame boundary. Needed when a connection changes hands mid-stream,
    /// e.g. when splitting after a handshake with pipelined data behind it.
    pub fn from_parts(stream: S, buf: Vec<u8>) -> Self {
        Self { stream, buf }
    }

    /// Tear down into the stream and any buffered unread bytes.
    pub fn into_parts(self) -> (S, Vec<u8>) {
        (self.stream, self.buf)
    }
}

impl<S: AsyncWrite + Unpin> Framed<S> {
    /// Send one message as a frame.
    pub async fn send<M: Message>(&mut self, msg: &M) -> io::Result<()> {
        let framed = frame::encode(msg);
        self.stream.write_all(&framed).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

impl<S: AsyncRead + Unpin> Framed<S> {
    /// Receive one message.
    ///
    /// Returns `Ok(None)` on a clean close between frames. A close in the
    /// middle of a frame, an oversized frame, or a malformed length prefix
    /// is an error.
    pub async fn recv<M: Message + Default>(&mut self) -> io::Result<Option<M>> {
        loop {
            match frame::scan(&self.buf) {
                Scan::Frame { header, body } => {
                    let msg = M::decode(&self.buf[header..header + body])
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
                    self.buf.drain(..header + body);
                    return Ok(Some(msg));
                }
                Scan::Malformed => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "malformed frame length prefix",
                    ));
                }
                Scan::Oversized { len } => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("frame of {len} bytes exceeds the frame limit"),
                    ));
                }
                Scan::Incomplete => {}
            }

            let mut tmp = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut tmp).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                ));
            }
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }

    /// Receive one message, giving up after `timeout`.
    ///
    /// Returns `Ok(None)` both on timeout and on clean close.
    pub async fn recv_timeout<M: Message + Default>(
        &mut self,
        timeout: std::time::Duration,
    ) -> io::Result<Option<M>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_elapsed) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_wire::Request;

    fn sample() -> Request {
        Request {
            service: "TestService".into(),
            procedure: "Echo".into(),
            arguments: vec![],
        }
    }

    #[tokio::test]
    async fn send_recv_roundtrip() {
        let (client, server) = tokio::io::duplex(1024);
        let mut tx = Framed::new(client);
        let mut rx = Framed::new(server);

        tx.send(&sample()).await.unwrap();
        let got: Request = rx.recv().await.unwrap().unwrap();
        assert_eq!(got, sample());
    }

    #[tokio::test]
    async fn frames_reassemble_from_arbitrary_chunks() {
        let (client, server) = tokio::io::duplex(1024);
        let mut rx = Framed::new(server);

        let bytes = frame::encode(&sample());
        let send = tokio::spawn(async move {
            let mut client = client;
            for chunk in bytes.chunks(3) {
                client.write_all(chunk).await.unwrap();
                client.flush().await.unwrap();
                tokio::task::yield_now().await;
            }
        });

        let got: Request = rx.recv().await.unwrap().unwrap();
        assert_eq!(got, sample());
        send.await.unwrap();
    }

    #[tokio::test]
    async fn clean_close_between_frames_is_none() {
        let (client, server) = tokio::io::duplex(1024);
        let mut rx = Framed::new(server);
        drop(client);

        let got: Option<Request> = rx.recv().await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn close_mid_frame_is_an_error() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut rx = Framed::new(server);

        let bytes = frame::encode(&sample());
        client.write_all(&bytes[..bytes.len() - 1]).await.unwrap();
        drop(client);

        let err = rx.recv::<Request>().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn back_to_back_frames_come_out_one_by_one() {
        let (client, server) = tokio::io::duplex(4096);
        let mut tx = Framed::new(client);
        let mut rx = Framed::new(server);

        tx.send(&sample()).await.unwrap();
        tx.send(&sample()).await.unwrap();

        let first: Request = rx.recv().await.unwrap().unwrap();
        let second: Request = rx.recv().await.unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn recv_timeout_expires_quietly() {
        let (_client, server) = tokio::io::duplex(1024);
        let mut rx = Framed::new(server);

        let got: Option<Request> = rx
            .recv_timeout(std::time::Duration::from_millis(20))
            .await
            .unwrap();
        assert!(got.is_none());
    }
}
