//! Connection Engine
//!
//! A live TCP socket plus the send/receive worker pair that decouples
//! application code from socket I/O.
//!
//! ```text
//!  post_message ─▶ send queue ─▶ send worker ─▶ socket
//!  get_message  ◀─ recv queue ◀─ recv worker ◀─ socket
//! ```
//!
//! Each direction moves independently through
//! `Stopped → Running → Stopping → Stopped`.

use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;

use crate::error::{MplError, Result};
use crate::protocol::{read_message, write_message, Message};
use crate::queue::BlockingQueue;

/// Lifecycle of one worker direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
    Stopping,
}

/// Last error recorded by a worker or shutdown path
type ErrorSlot = Arc<Mutex<Option<String>>>;

/// A connected socket with its queues and workers
///
/// Owned by exactly one session (a connector or a server-side handler).
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,

    send_queue: Arc<BlockingQueue<Message>>,
    recv_queue: Arc<BlockingQueue<Message>>,

    sending: AtomicCell<WorkerState>,
    receiving: AtomicCell<WorkerState>,

    send_worker: Mutex<Option<JoinHandle<()>>>,
    recv_worker: Mutex<Option<JoinHandle<()>>>,

    last_error: ErrorSlot,
    closed: AtomicCell<bool>,
}

impl Connection {
    /// Wrap a connected stream
    pub fn new(stream: TcpStream, nodelay: bool) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        stream.set_nodelay(nodelay)?;

        Ok(Self {
            stream,
            peer_addr,
            local_addr,
            send_queue: Arc::new(BlockingQueue::new()),
            recv_queue: Arc::new(BlockingQueue::new()),
            sending: AtomicCell::new(WorkerState::Stopped),
            receiving: AtomicCell::new(WorkerState::Stopped),
            send_worker: Mutex::new(None),
            recv_worker: Mutex::new(None),
            last_error: Arc::new(Mutex::new(None)),
            closed: AtomicCell::new(false),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load() != WorkerState::Stopped
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving.load() != WorkerState::Stopped
    }

    pub fn send_state(&self) -> WorkerState {
        self.sending.load()
    }

    pub fn recv_state(&self) -> WorkerState {
        self.receiving.load()
    }

    /// Most recent error swallowed by a worker or a stop path
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    fn record_error(&self, error: impl Into<String>) {
        *self.last_error.lock() = Some(error.into());
    }

    /// Start the workers selected by the queueing switches
    pub fn start_workers(&self, use_send_queue: bool, use_recv_queue: bool) -> Result<()> {
        if use_send_queue {
            self.start_sending()?;
        }
        if use_recv_queue {
            self.start_receiving()?;
        }
        Ok(())
    }

    // =========================================================================
    // Send Side
    // =========================================================================

    /// Launch the send worker if it is not already running
    pub fn start_sending(&self) -> Result<()> {
        if self
            .sending
            .compare_exchange(WorkerState::Stopped, WorkerState::Running)
            .is_err()
        {
            return Ok(());
        }

        let spawned = self.stream.try_clone().and_then(|stream| {
            let queue = Arc::clone(&self.send_queue);
            let last_error = Arc::clone(&self.last_error);
            let peer = self.peer_addr;
            thread::Builder::new()
                .name(format!("mpl-send-{}", peer))
                .spawn(move || send_loop(stream, queue, peer, last_error))
        });

        match spawned {
            Ok(handle) => {
                *self.send_worker.lock() = Some(handle);
                tracing::trace!("Send worker started for {}", self.peer_addr);
                Ok(())
            }
            Err(e) => {
                self.sending.store(WorkerState::Stopped);
                Err(MplError::Io(e))
            }
        }
    }

    /// Flush the send queue through the worker and wait for it to exit
    ///
    /// Never fails; the state is forced back to `Stopped`.
    pub fn stop_sending(&self) {
        if self
            .sending
            .compare_exchange(WorkerState::Running, WorkerState::Stopping)
            .is_err()
        {
            return;
        }

        // FIFO order puts the sentinel behind every message already posted
        self.send_queue.enqueue(Message::stop_sending());

        if let Some(handle) = self.send_worker.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("Send worker for {} panicked", self.peer_addr);
                self.record_error("send worker panicked");
            }
        }

        self.sending.store(WorkerState::Stopped);
        tracing::trace!("Send worker stopped for {}", self.peer_addr);
    }

    /// Queue a message for the send worker
    pub fn post_message(&self, message: Message) {
        self.send_queue.enqueue(message);
    }

    /// Write a message on the calling thread, bypassing the send queue
    pub fn send_now(&self, message: &Message) -> Result<()> {
        if self.is_sending() {
            return Err(MplError::Connection(
                "send worker owns the socket; use post_message".to_string(),
            ));
        }
        let mut stream = &self.stream;
        write_message(&mut stream, message)
    }

    // =========================================================================
    // Receive Side
    // =========================================================================

    /// Launch the receive worker if it is not already running
    pub fn start_receiving(&self) -> Result<()> {
        if self
            .receiving
            .compare_exchange(WorkerState::Stopped, WorkerState::Running)
            .is_err()
        {
            return Ok(());
        }

        let spawned = self.stream.try_clone().and_then(|stream| {
            let queue = Arc::clone(&self.recv_queue);
            let last_error = Arc::clone(&self.last_error);
            let peer = self.peer_addr;
            thread::Builder::new()
                .name(format!("mpl-recv-{}", peer))
                .spawn(move || recv_loop(stream, queue, peer, last_error))
        });

        match spawned {
            Ok(handle) => {
                *self.recv_worker.lock() = Some(handle);
                tracing::trace!("Receive worker started for {}", self.peer_addr);
                Ok(())
            }
            Err(e) => {
                self.receiving.store(WorkerState::Stopped);
                Err(MplError::Io(e))
            }
        }
    }

    /// Wait for the receive worker to exit
    ///
    /// The worker exits once it has queued a `Disconnect`, so this blocks
    /// until the peer closes its write side. Never fails.
    pub fn stop_receiving(&self) {
        if self
            .receiving
            .compare_exchange(WorkerState::Running, WorkerState::Stopping)
            .is_err()
        {
            return;
        }

        if let Some(handle) = self.recv_worker.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("Receive worker for {} panicked", self.peer_addr);
                self.record_error("receive worker panicked");
            }
        }

        self.receiving.store(WorkerState::Stopped);
        tracing::trace!("Receive worker stopped for {}", self.peer_addr);
    }

    /// Take the oldest received message, blocking until one arrives
    pub fn get_message(&self) -> Message {
        self.recv_queue.dequeue()
    }

    pub fn recv_queue(&self) -> Arc<BlockingQueue<Message>> {
        Arc::clone(&self.recv_queue)
    }

    /// Read a message on the calling thread, bypassing the receive queue
    pub fn receive_now(&self) -> Result<Message> {
        if self.is_receiving() {
            return Err(MplError::Connection(
                "receive worker owns the socket; use get_message".to_string(),
            ));
        }
        let mut stream = &self.stream;
        read_message(&mut stream)
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Half-close: no more data from this side
    pub fn shutdown_send(&self) {
        self.shutdown_direction(Shutdown::Write);
    }

    /// Half-close: stop accepting data from the peer
    pub fn shutdown_recv(&self) {
        self.shutdown_direction(Shutdown::Read);
    }

    fn shutdown_direction(&self, how: Shutdown) {
        if let Err(e) = self.stream.shutdown(how) {
            // Peer may already be gone
            tracing::debug!("shutdown({:?}) on {} failed: {}", how, self.peer_addr, e);
            if e.kind() != std::io::ErrorKind::NotConnected {
                self.record_error(format!("shutdown({:?}) failed: {}", how, e));
            }
        }
    }

    /// Orderly shutdown
    ///
    /// 1. flush and stop the send worker
    /// 2. half-close the send direction (peer reads end of stream)
    /// 3. join the optional external listener, then stop the receive worker
    /// 4. half-close the receive direction
    ///
    /// The socket itself is closed when the connection is dropped.
    pub fn shutdown(&self, listener: Option<JoinHandle<()>>) {
        if self.closed.swap(true) {
            return;
        }

        self.stop_sending();
        self.shutdown_send();

        if let Some(listener) = listener {
            if listener.join().is_err() {
                tracing::warn!("Listener thread for {} panicked", self.peer_addr);
                self.record_error("listener thread panicked");
            }
        }

        self.stop_receiving();
        self.shutdown_recv();

        tracing::debug!("Connection to {} shut down", self.peer_addr);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.closed.swap(true) {
            return;
        }
        // Abandoned without an orderly shutdown: flush what we can, then
        // cut both directions so a blocked receive worker sees end of stream.
        self.stop_sending();
        let _ = self.stream.shutdown(Shutdown::Both);
        tracing::debug!("Connection to {} dropped without shutdown", self.peer_addr);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("local_addr", &self.local_addr)
            .field("sending", &self.sending.load())
            .field("receiving", &self.receiving.load())
            .finish()
    }
}

// =============================================================================
// Worker Loops
// =============================================================================

fn send_loop(
    mut stream: TcpStream,
    queue: Arc<BlockingQueue<Message>>,
    peer: SocketAddr,
    last_error: ErrorSlot,
) {
    let mut broken = false;
    loop {
        let message = queue.dequeue();
        if message.is_stop_sending() {
            break;
        }
        // Keep draining after a failure so the stop sentinel is still seen
        if broken {
            continue;
        }
        if let Err(e) = write_message(&mut stream, &message) {
            tracing::warn!("Send to {} failed: {}", peer, e);
            *last_error.lock() = Some(e.to_string());
            broken = true;
        }
    }
}

fn recv_loop(
    stream: TcpStream,
    queue: Arc<BlockingQueue<Message>>,
    peer: SocketAddr,
    last_error: ErrorSlot,
) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_message(&mut reader) {
            Ok(message) => {
                let done = message.is_disconnect();
                queue.enqueue(message);
                if done {
                    tracing::debug!("Peer {} disconnected", peer);
                    break;
                }
            }
            Err(e) => {
                if e.is_disconnect() {
                    tracing::debug!("Connection to {} lost: {}", peer, e);
                } else {
                    tracing::warn!("Receive from {} failed: {}", peer, e);
                }
                *last_error.lock() = Some(e.to_string());
                // Consumers must never wait forever on a dead worker
                queue.enqueue(Message::disconnect());
                break;
            }
        }
    }
}
