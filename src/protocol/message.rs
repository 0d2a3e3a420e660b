//! Message definitions
//!
//! A typed, immutable payload exchanged between peers.

use std::fmt;

use bytes::Bytes;

use crate::error::{MplError, Result};

/// Message types
///
/// Values are fixed for wire compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Default = 0,
    Text = 1,
    Reply = 2,
    End = 4,
    Quit = 8,
    /// Local sentinel: the peer closed its write side
    Disconnect = 16,
    /// Local sentinel: tells the send worker to exit
    StopSending = 32,
    String = 64,
    Binary = 128,
}

impl MessageType {
    /// Every message type, in wire value order
    pub const ALL: [MessageType; 9] = [
        MessageType::Default,
        MessageType::Text,
        MessageType::Reply,
        MessageType::End,
        MessageType::Quit,
        MessageType::Disconnect,
        MessageType::StopSending,
        MessageType::String,
        MessageType::Binary,
    ];

    /// True for the two control sentinels that carry no application data
    pub fn is_control(self) -> bool {
        matches!(self, MessageType::Disconnect | MessageType::StopSending)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = MplError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MessageType::Default),
            1 => Ok(MessageType::Text),
            2 => Ok(MessageType::Reply),
            4 => Ok(MessageType::End),
            8 => Ok(MessageType::Quit),
            16 => Ok(MessageType::Disconnect),
            32 => Ok(MessageType::StopSending),
            64 => Ok(MessageType::String),
            128 => Ok(MessageType::Binary),
            _ => Err(MplError::Protocol(format!(
                "Unknown message type: 0x{:02x}",
                value
            ))),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        value as u8
    }
}

/// A message: type tag plus payload
///
/// The payload is reference counted, so cloning is cheap and never copies
/// the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    msg_type: MessageType,
    content: Bytes,
}

impl Message {
    /// Create a message from any byte source
    pub fn new(content: impl Into<Bytes>, msg_type: MessageType) -> Self {
        Self {
            msg_type,
            content: content.into(),
        }
    }

    /// Create a message with an empty payload
    pub fn empty(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            content: Bytes::new(),
        }
    }

    /// Create a UTF-8 text message
    pub fn text(content: impl Into<String>, msg_type: MessageType) -> Self {
        let content: String = content.into();
        Self::new(content, msg_type)
    }

    /// Sentinel synthesized when the peer closes cleanly
    pub fn disconnect() -> Self {
        Self::empty(MessageType::Disconnect)
    }

    /// Sentinel that stops a send worker
    pub fn stop_sending() -> Self {
        Self::empty(MessageType::StopSending)
    }

    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Consume the message, keeping the payload
    pub fn into_content(self) -> Bytes {
        self.content
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Payload as text, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    pub fn is_disconnect(&self) -> bool {
        self.msg_type == MessageType::Disconnect
    }

    pub fn is_stop_sending(&self) -> bool {
        self.msg_type == MessageType::StopSending
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::empty(MessageType::Default)
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Self::text(value, MessageType::Default)
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Self::text(value, MessageType::Default)
    }
}

impl From<Vec<u8>> for Message {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value, MessageType::Binary)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.content))
    }
}
