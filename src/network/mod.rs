//! Network Module
//!
//! Client and server ends of an MPL connection.
//!
//! ## Architecture
//! - `Connection`: socket + send/receive workers + blocking queues
//! - `Connector`: client side, connect with optional retry
//! - `Responder`: accept-loop thread, one service thread per client
//! - `ClientHandler`: per-connection application logic, cloned from a prototype

mod connection;
mod connector;
mod handler;
mod responder;

pub use connection::{Connection, WorkerState};
pub use connector::Connector;
pub use handler::{ClientHandler, EchoHandler, Session};
pub use responder::Responder;
