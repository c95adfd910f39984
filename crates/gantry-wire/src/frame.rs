//! Varint length-prefixed framing.
//!
//! Every message on a stream transport travels as
//! `varint(length) || message_bytes`. Encoding delegates to prost's
//! length-delimited helpers; [`scan`] supports incremental decoding from a
//! growing receive buffer.

use bytes::Buf;
use prost::Message;

/// Frames larger than this are treated as protocol violations rather than
/// buffered indefinitely.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Longest possible varint length prefix.
const MAX_PREFIX_LEN: usize = 10;

/// Encode `msg` as one frame.
pub fn encode<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_length_delimited_to_vec()
}

/// Decode one complete frame from `buf`.
///
/// The buffer must start at a length prefix and contain the whole message.
pub fn decode<M: Message + Default>(buf: &[u8]) -> Result<M, prost::DecodeError> {
    M::decode_length_delimited(buf)
}

/// Outcome of scanning a receive buffer for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// More bytes are needed before a frame can be extracted.
    Incomplete,
    /// One complete frame: the message body is `buf[header..header + body]`,
    /// and `header + body` bytes must be drained afterwards.
    Frame { header: usize, body: usize },
    /// The length prefix is not a valid varint.
    Malformed,
    /// The declared length exceeds [`MAX_FRAME_LEN`].
    Oversized { len: u64 },
}

/// Scan the front of a receive buffer for one complete frame.
pub fn scan(buf: &[u8]) -> Scan {
    let mut cursor = buf;
    let len = match prost::encoding::decode_varint(&mut cursor) {
        Ok(len) => len,
        // A truncated prefix is indistinguishable from a malformed one until
        // enough bytes have arrived to rule the former out.
        Err(_) if buf.len() < MAX_PREFIX_LEN => return Scan::Incomplete,
        Err(_) => return Scan::Malformed,
    };

    if len > MAX_FRAME_LEN as u64 {
        return Scan::Oversized { len };
    }

    let header = buf.len() - cursor.remaining();
    if cursor.remaining() < len as usize {
        return Scan::Incomplete;
    }

    Scan::Frame {
        header,
        body: len as usize,
    }
}
