//! Protocol Module
//!
//! Defines the wire protocol shared by connectors and responders.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Type (1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Message Types
//! - 0x00: DEFAULT
//! - 0x01: TEXT
//! - 0x02: REPLY
//! - 0x04: END
//! - 0x08: QUIT
//! - 0x10: DISCONNECT   (local sentinel, peer closed cleanly)
//! - 0x20: STOP_SENDING (local sentinel, stops the send worker)
//! - 0x40: STRING
//! - 0x80: BINARY
//!
//! A zero-byte read where a header was expected means the peer closed its
//! write side; it is surfaced as a DISCONNECT message, not an error.

mod codec;
mod message;

pub use codec::{
    decode, decode_header, encode, read_message, write_message, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
pub use message::{Message, MessageType};
