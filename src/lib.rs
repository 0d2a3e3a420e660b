//! # MPL
//!
//! A minimal message-passing library over TCP:
//! - Fixed 5-byte header framing of typed messages
//! - Unbounded blocking queues between application code and socket I/O
//! - One send worker and one receive worker per connection
//! - Thread-per-connection responder with cloneable handler prototypes
//! - Client connector with bounded connect retry
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐                              ┌──────────────────────┐
//! │  Connector   │                              │      Responder       │
//! │              │                              │    (accept loop)     │
//! │ post_message │                              └──────────┬───────────┘
//! │      │       │                                         │ clone prototype
//! │      ▼       │                                         ▼
//! │ send queue ──┼─▶ send worker ══ TCP ══▶ recv worker ─▶ recv queue
//! │              │                                         │
//! │ recv queue ◀─┼── recv worker ◀══ TCP ══ send worker ◀─ send queue
//! │      │       │                                         ▲
//! │      ▼       │                              ┌──────────┴───────────┐
//! │ get_message  │                              │ ClientHandler (clone)│
//! └──────────────┘                              └──────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod queue;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{MplError, Result};
pub use config::Config;
pub use protocol::{Message, MessageType};
pub use queue::BlockingQueue;
pub use network::{ClientHandler, Connector, EchoHandler, Responder, Session};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of MPL
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
