//! Client Connector
//!
//! Owns the client side of a connection and drives its workers.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::atomic::AtomicCell;

use super::connection::Connection;
use crate::config::Config;
use crate::error::{MplError, Result};
use crate::protocol::Message;
use crate::queue::BlockingQueue;

/// TCP client endpoint
pub struct Connector {
    /// Live connection, present between `connect` and `close`
    connection: Option<Connection>,

    use_send_queue: AtomicCell<bool>,
    use_recv_queue: AtomicCell<bool>,
    nodelay: bool,
}

impl Connector {
    /// Create an unconnected connector with queueing enabled
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            connection: None,
            use_send_queue: AtomicCell::new(config.use_send_queue),
            use_recv_queue: AtomicCell::new(config.use_recv_queue),
            nodelay: config.nodelay,
        }
    }

    pub fn use_send_queue(&self, enabled: bool) {
        self.use_send_queue.store(enabled);
    }

    pub fn use_recv_queue(&self, enabled: bool) {
        self.use_recv_queue.store(enabled);
    }

    pub fn use_queues(&self, enabled: bool) {
        self.use_send_queue(enabled);
        self.use_recv_queue(enabled);
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| !c.is_closed())
            .unwrap_or(false)
    }

    pub fn is_sending(&self) -> bool {
        self.connection.as_ref().map(|c| c.is_sending()).unwrap_or(false)
    }

    pub fn is_receiving(&self) -> bool {
        self.connection
            .as_ref()
            .map(|c| c.is_receiving())
            .unwrap_or(false)
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|c| c.peer_addr())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|c| c.local_addr())
    }

    /// Last error swallowed by a worker or the shutdown path
    pub fn last_error(&self) -> Option<String> {
        self.connection.as_ref().and_then(|c| c.last_error())
    }

    // =========================================================================
    // Connecting
    // =========================================================================

    /// Make a single connection attempt
    ///
    /// On success the workers are started according to the queue switches.
    /// Any open connection is shut down first.
    pub fn connect<A: ToSocketAddrs>(&mut self, endpoint: A) -> Result<()> {
        self.close();

        let stream = TcpStream::connect(endpoint)
            .map_err(|e| MplError::Connection(format!("connect failed: {}", e)))?;
        let connection = Connection::new(stream, self.nodelay)?;
        connection.start_workers(self.use_send_queue.load(), self.use_recv_queue.load())?;

        tracing::debug!(
            "Connected {} -> {}",
            connection.local_addr(),
            connection.peer_addr()
        );
        self.connection = Some(connection);
        Ok(())
    }

    /// Try to connect up to `retries` times, sleeping `wait_secs` between
    /// failed attempts
    ///
    /// Returns the number of attempts consumed. Check `is_connected`
    /// afterwards to learn whether one succeeded. With `verbosity > 0`
    /// every attempt is logged at info level.
    pub fn connect_with_retry<A: ToSocketAddrs + Copy + std::fmt::Debug>(
        &mut self,
        endpoint: A,
        retries: u32,
        wait_secs: u64,
        verbosity: u32,
    ) -> u32 {
        self.connect_with_retry_delay(endpoint, retries, Duration::from_secs(wait_secs), verbosity)
    }

    /// Same as `connect_with_retry` with a sub-second delay
    pub fn connect_with_retry_delay<A: ToSocketAddrs + Copy + std::fmt::Debug>(
        &mut self,
        endpoint: A,
        retries: u32,
        delay: Duration,
        verbosity: u32,
    ) -> u32 {
        let mut attempts = 0;
        while attempts < retries {
            attempts += 1;
            if verbosity > 0 {
                tracing::info!("Connection attempt {} of {} to {:?}", attempts, retries, endpoint);
            } else {
                tracing::debug!("Connection attempt {} of {} to {:?}", attempts, retries, endpoint);
            }

            match self.connect(endpoint) {
                Ok(()) => break,
                Err(e) => {
                    if verbosity > 0 {
                        tracing::info!("Failed attempt {}: {}", attempts, e);
                    } else {
                        tracing::debug!("Failed attempt {}: {}", attempts, e);
                    }
                    if attempts < retries {
                        thread::sleep(delay);
                    }
                }
            }
        }
        attempts
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection
            .as_ref()
            .filter(|c| !c.is_closed())
            .ok_or_else(|| MplError::Connection("not connected".to_string()))
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Queue a message for the send worker
    pub fn post_message(&self, message: Message) -> Result<()> {
        self.connection()?.post_message(message);
        Ok(())
    }

    /// Take the next received message, blocking until one arrives
    pub fn get_message(&self) -> Result<Message> {
        Ok(self.connection()?.get_message())
    }

    /// Shared handle on the receive queue, for a listener thread that
    /// drains messages while this side closes
    pub fn recv_queue(&self) -> Result<Arc<BlockingQueue<Message>>> {
        Ok(self.connection()?.recv_queue())
    }

    /// Write a message directly to the socket
    pub fn send_message(&self, message: &Message) -> Result<()> {
        self.connection()?.send_now(message)
    }

    /// Read a message directly from the socket
    pub fn receive_message(&self) -> Result<Message> {
        self.connection()?.receive_now()
    }

    // =========================================================================
    // Closing
    // =========================================================================

    /// Run the orderly shutdown sequence and release the socket
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.shutdown(None);
        }
    }

    /// Like `close`, joining `listener` after the send side is closed
    ///
    /// Use this when another thread is still draining `get_message`.
    pub fn close_with_listener(&mut self, listener: JoinHandle<()>) {
        match self.connection.take() {
            Some(connection) => connection.shutdown(Some(listener)),
            None => {
                let _ = listener.join();
            }
        }
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}
