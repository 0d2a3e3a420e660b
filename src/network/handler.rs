//! Client Handlers
//!
//! Per-connection application behavior for the responder. The responder
//! keeps one prototype handler and clones it for every accepted socket;
//! the clone runs against a [`Session`] bound to that socket.

use std::net::SocketAddr;

use super::connection::Connection;
use crate::error::Result;
use crate::protocol::Message;

/// Application logic run once per accepted connection
pub trait ClientHandler: Send + 'static {
    /// Produce a fresh handler for a new connection
    fn clone_handler(&self) -> Box<dyn ClientHandler>;

    /// Serve one client until done
    ///
    /// The connection is shut down in order when this returns, whether it
    /// returns `Ok`, `Err`, or panics.
    fn app_proc(&mut self, session: &Session) -> Result<()>;
}

/// A handler's view of its connection
pub struct Session {
    connection: Connection,
    service_addr: SocketAddr,
    use_send_queue: bool,
    use_recv_queue: bool,
}

impl Session {
    pub(crate) fn new(
        connection: Connection,
        service_addr: SocketAddr,
        use_send_queue: bool,
        use_recv_queue: bool,
    ) -> Self {
        Self {
            connection,
            service_addr,
            use_send_queue,
            use_recv_queue,
        }
    }

    /// Address of the connected client
    pub fn remote_addr(&self) -> SocketAddr {
        self.connection.peer_addr()
    }

    /// Endpoint the responder is listening on
    pub fn service_addr(&self) -> SocketAddr {
        self.service_addr
    }

    pub fn uses_send_queue(&self) -> bool {
        self.use_send_queue
    }

    pub fn uses_recv_queue(&self) -> bool {
        self.use_recv_queue
    }

    /// Take the next received message from the receive queue
    pub fn get_message(&self) -> Message {
        self.connection.get_message()
    }

    /// Queue a message for the send worker
    pub fn post_message(&self, message: Message) {
        self.connection.post_message(message);
    }

    /// Write a message directly to the socket
    pub fn send_message(&self, message: &Message) -> Result<()> {
        self.connection.send_now(message)
    }

    /// Read a message directly from the socket
    pub fn receive_message(&self) -> Result<Message> {
        self.connection.receive_now()
    }

    /// Receive through whichever path this session is configured for
    pub fn next_message(&self) -> Result<Message> {
        if self.use_recv_queue {
            Ok(self.get_message())
        } else {
            self.receive_message()
        }
    }

    /// Send through whichever path this session is configured for
    pub fn reply(&self, message: Message) -> Result<()> {
        if self.use_send_queue {
            self.post_message(message);
            Ok(())
        } else {
            self.send_message(&message)
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.connection.last_error()
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.connection
    }
}

/// Echoes every message back to its sender until the client disconnects
#[derive(Debug, Default, Clone)]
pub struct EchoHandler;

impl ClientHandler for EchoHandler {
    fn clone_handler(&self) -> Box<dyn ClientHandler> {
        Box::new(self.clone())
    }

    fn app_proc(&mut self, session: &Session) -> Result<()> {
        loop {
            let message = session.next_message()?;
            if message.is_disconnect() {
                tracing::debug!("Client {} finished", session.remote_addr());
                return Ok(());
            }
            tracing::trace!("From client {}: {}", session.remote_addr(), message);
            session.reply(message)?;
        }
    }
}
