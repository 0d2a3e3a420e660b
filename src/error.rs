//! Error types for MPL
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using MplError
pub type Result<T> = std::result::Result<T, MplError>;

/// Unified error type for MPL operations
#[derive(Debug, Error)]
pub enum MplError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Wire Errors
    // -------------------------------------------------------------------------
    /// Frame could not be read or built; the connection is broken
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Connection error: {0}")]
    Connection(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Application Errors
    // -------------------------------------------------------------------------
    #[error("Handler error: {0}")]
    Handler(String),
}

impl MplError {
    /// True if the error means the peer went away underneath us
    pub fn is_disconnect(&self) -> bool {
        match self {
            MplError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}
