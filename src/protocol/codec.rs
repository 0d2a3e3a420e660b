//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! `Len` is an unsigned 32-bit big-endian integer equal to the payload length.

use std::io::{ErrorKind, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::{Message, MessageType};
use crate::error::{MplError, Result};

/// Header size: 1 byte message type + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Largest payload the length field can describe
pub const MAX_PAYLOAD_SIZE: u64 = u32::MAX as u64;

/// Upfront reservation when reading a payload off the stream
const INITIAL_PAYLOAD_CAPACITY: usize = 64 * 1024;

// =============================================================================
// Frame Encoding/Decoding
// =============================================================================

/// Encode a message to bytes
///
/// Format: msg_type (1) + payload_len (4) + payload
pub fn encode(message: &Message) -> Result<Bytes> {
    let payload = message.content();
    if payload.len() as u64 > MAX_PAYLOAD_SIZE {
        return Err(MplError::Protocol(format!(
            "Payload too large: {} bytes (max {})",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u8(message.msg_type().into());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(payload);

    Ok(frame.freeze())
}

/// Decode the fixed-size header into its type and payload length
pub fn decode_header(header: &[u8; HEADER_SIZE]) -> Result<(MessageType, u32)> {
    let msg_type = MessageType::try_from(header[0])?;
    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    Ok((msg_type, payload_len))
}

/// Decode one complete frame from a byte slice
///
/// Trailing bytes beyond the declared payload are ignored.
pub fn decode(bytes: &[u8]) -> Result<Message> {
    if bytes.len() < HEADER_SIZE {
        return Err(MplError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut header = [0u8; HEADER_SIZE];
    header.copy_from_slice(&bytes[..HEADER_SIZE]);
    let (msg_type, payload_len) = decode_header(&header)?;

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(MplError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            payload_len,
            bytes.len() - HEADER_SIZE
        )));
    }

    Ok(Message::new(
        Bytes::copy_from_slice(&bytes[HEADER_SIZE..total_len]),
        msg_type,
    ))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read until `buf` is full or the stream reaches end of file
///
/// Returns the number of bytes actually read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read a complete message from a stream
///
/// Blocks until a full frame arrives. A clean end of stream before any
/// header byte yields a `Disconnect` message; a frame cut short anywhere
/// else is a protocol error.
pub fn read_message<R: Read>(reader: &mut R) -> Result<Message> {
    let mut header = [0u8; HEADER_SIZE];
    let header_read = read_full(reader, &mut header)?;

    if header_read == 0 {
        return Ok(Message::disconnect());
    }
    if header_read < HEADER_SIZE {
        return Err(MplError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE, header_read
        )));
    }

    let (msg_type, payload_len) = decode_header(&header)?;

    // The declared length is untrusted: grow the buffer as bytes arrive
    let mut payload = Vec::with_capacity((payload_len as usize).min(INITIAL_PAYLOAD_CAPACITY));
    reader
        .by_ref()
        .take(payload_len as u64)
        .read_to_end(&mut payload)?;
    if payload.len() != payload_len as usize {
        return Err(MplError::Protocol(format!(
            "Incomplete payload: expected {} bytes, got {}",
            payload_len,
            payload.len()
        )));
    }

    Ok(Message::new(payload, msg_type))
}

/// Write a message to a stream
///
/// Short writes are retried until the whole frame is out.
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let frame = encode(message)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    Ok(())
}
