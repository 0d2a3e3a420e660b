//! TCP Responder
//!
//! Accepts connections and serves each one on its own thread with a clone
//! of the registered handler prototype.
//!
//! ## Threads
//! - one accept-loop thread per responder
//! - one service thread per accepted client, running the handler
//! - the send/receive workers of each client's connection

use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::atomic::AtomicCell;
use socket2::{Domain, Protocol, Socket, Type};

use super::connection::Connection;
use super::handler::{ClientHandler, EchoHandler, Session};
use crate::config::{max_clients_from_count, Config};
use crate::error::{MplError, Result};

/// First pause after a failed accept
const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Longest pause between failed accepts
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_millis(500);

/// State shared between the responder and its accept loop
struct AcceptContext {
    service_addr: SocketAddr,
    max_clients: Arc<AtomicCell<Option<usize>>>,
    clients_served: Arc<AtomicCell<usize>>,
    shutdown: Arc<AtomicCell<bool>>,
    use_send_queue: bool,
    use_recv_queue: bool,
    nodelay: bool,
}

/// TCP server that hands each client to a cloned handler
pub struct Responder {
    /// Bound socket, consumed when listening starts
    socket: Option<Socket>,
    local_addr: SocketAddr,

    prototype: Box<dyn ClientHandler>,

    max_clients: Arc<AtomicCell<Option<usize>>>,
    clients_served: Arc<AtomicCell<usize>>,
    shutdown: Arc<AtomicCell<bool>>,
    listening: AtomicCell<bool>,

    accept_thread: Option<JoinHandle<()>>,

    use_send_queue: bool,
    use_recv_queue: bool,
    nodelay: bool,
}

impl Responder {
    /// Bind to `endpoint` with the default echo handler
    ///
    /// Port 0 picks an ephemeral port; see [`Responder::local_addr`].
    pub fn bind<A: ToSocketAddrs>(endpoint: A) -> Result<Self> {
        let addr = endpoint
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| MplError::Config("endpoint resolved to no address".to_string()))?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;

        let local_addr = socket
            .local_addr()?
            .as_socket()
            .ok_or_else(|| MplError::Config(format!("{} is not an inet address", addr)))?;

        Ok(Self {
            socket: Some(socket),
            local_addr,
            prototype: Box::new(EchoHandler),
            max_clients: Arc::new(AtomicCell::new(None)),
            clients_served: Arc::new(AtomicCell::new(0)),
            shutdown: Arc::new(AtomicCell::new(false)),
            listening: AtomicCell::new(false),
            accept_thread: None,
            use_send_queue: true,
            use_recv_queue: true,
            nodelay: true,
        })
    }

    /// Bind using the listen address, client limit and queue switches of `config`
    pub fn with_config(config: &Config) -> Result<Self> {
        let mut responder = Self::bind(config.listen_addr.as_str())?;
        responder.max_clients.store(config.max_clients);
        responder.use_send_queue = config.use_send_queue;
        responder.use_recv_queue = config.use_recv_queue;
        responder.nodelay = config.nodelay;
        Ok(responder)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load()
    }

    /// Clients accepted so far
    pub fn clients_served(&self) -> usize {
        self.clients_served.load()
    }

    pub fn max_clients(&self) -> Option<usize> {
        self.max_clients.load()
    }

    /// Set the total number of clients to serve; -1 serves forever
    pub fn set_max_clients(&self, count: i64) -> Result<()> {
        self.max_clients.store(max_clients_from_count(count)?);
        Ok(())
    }

    /// Replace the handler prototype; only allowed before `start`
    pub fn register_handler(&mut self, prototype: Box<dyn ClientHandler>) -> Result<()> {
        if self.is_listening() {
            return Err(MplError::Config(
                "cannot register a handler while listening".to_string(),
            ));
        }
        self.prototype = prototype;
        Ok(())
    }

    pub fn use_send_queue(&mut self, enabled: bool) {
        self.use_send_queue = enabled;
    }

    pub fn use_recv_queue(&mut self, enabled: bool) {
        self.use_recv_queue = enabled;
    }

    pub fn use_queues(&mut self, enabled: bool) {
        self.use_send_queue = enabled;
        self.use_recv_queue = enabled;
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start listening and launch the accept loop
    ///
    /// A no-op if already listening. Fails once the responder has been
    /// stopped, since the listening socket is gone.
    pub fn start(&mut self, backlog: i32) -> Result<()> {
        if self.is_listening() {
            return Ok(());
        }

        let socket = self.socket.take().ok_or_else(|| {
            MplError::Connection("listening socket already closed".to_string())
        })?;
        socket.listen(backlog)?;
        let listener: TcpListener = socket.into();

        let context = AcceptContext {
            service_addr: self.local_addr,
            max_clients: Arc::clone(&self.max_clients),
            clients_served: Arc::clone(&self.clients_served),
            shutdown: Arc::clone(&self.shutdown),
            use_send_queue: self.use_send_queue,
            use_recv_queue: self.use_recv_queue,
            nodelay: self.nodelay,
        };
        let prototype = self.prototype.clone_handler();

        let handle = thread::Builder::new()
            .name(format!("mpl-accept-{}", self.local_addr))
            .spawn(move || accept_loop(listener, prototype, context))?;

        self.accept_thread = Some(handle);
        self.listening.store(true);
        tracing::info!("Listening on {}", self.local_addr);
        Ok(())
    }

    /// Wait for the accept loop to exit on its own (client limit reached)
    ///
    /// Blocks forever on an unbounded responder; use `stop` there.
    pub fn wait(&mut self) {
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                tracing::error!("Accept loop on {} panicked", self.local_addr);
            }
        }
        self.listening.store(false);
    }

    /// Stop accepting, wait for every client thread, and close the listener
    pub fn stop(&mut self) {
        if !self.is_listening() {
            return;
        }

        self.shutdown.store(true);
        if let Some(handle) = self.accept_thread.as_ref() {
            if !handle.is_finished() {
                self.wake_accept_loop();
            }
        }
        self.wait();
        tracing::info!("Responder on {} stopped", self.local_addr);
    }

    /// Unblock a pending `accept` so the loop can observe the shutdown flag
    fn wake_accept_loop(&self) {
        let mut addr = self.local_addr;
        if addr.ip().is_unspecified() {
            match addr {
                SocketAddr::V4(_) => addr.set_ip(std::net::Ipv4Addr::LOCALHOST.into()),
                SocketAddr::V6(_) => addr.set_ip(std::net::Ipv6Addr::LOCALHOST.into()),
            }
        }
        if let Err(e) = TcpStream::connect(addr) {
            tracing::debug!("Wake-up connection to {} failed: {}", addr, e);
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// Accept Loop
// =============================================================================

fn limit_reached(context: &AcceptContext) -> bool {
    match context.max_clients.load() {
        Some(max) => context.clients_served.load() >= max,
        None => false,
    }
}

/// Pause after a failed accept, doubling per consecutive failure
fn accept_backoff(failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(6);
    (ACCEPT_BACKOFF_BASE * (1 << exp)).min(ACCEPT_BACKOFF_MAX)
}

fn accept_loop(listener: TcpListener, prototype: Box<dyn ClientHandler>, context: AcceptContext) {
    let mut services: Vec<JoinHandle<()>> = Vec::new();
    let mut failures: u32 = 0;

    while !context.shutdown.load() && !limit_reached(&context) {
        let (stream, addr) = match listener.accept() {
            Ok(pair) => {
                failures = 0;
                pair
            }
            Err(e) => {
                if context.shutdown.load() {
                    break;
                }
                failures = failures.saturating_add(1);
                let pause = accept_backoff(failures);
                tracing::warn!(
                    "Accept on {} failed: {} (retrying in {:?})",
                    context.service_addr,
                    e,
                    pause
                );
                // Persistent errors such as EMFILE would otherwise spin
                thread::sleep(pause);
                continue;
            }
        };

        if context.shutdown.load() {
            break;
        }

        let served = context.clients_served.fetch_add(1) + 1;
        tracing::info!("Serving client {} from {}", served, addr);

        let connection = match Connection::new(stream, context.nodelay) {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("Dropping client {}: {}", addr, e);
                continue;
            }
        };
        let session = Session::new(
            connection,
            context.service_addr,
            context.use_send_queue,
            context.use_recv_queue,
        );
        let handler = prototype.clone_handler();

        match thread::Builder::new()
            .name(format!("mpl-client-{}", addr))
            .spawn(move || service_client(handler, session))
        {
            Ok(handle) => services.push(handle),
            Err(e) => tracing::error!("Failed to spawn service thread for {}: {}", addr, e),
        }

        reap_finished(&mut services);
    }

    tracing::debug!(
        "Accept loop on {} exiting, waiting for {} client(s)",
        context.service_addr,
        services.len()
    );
    for handle in services {
        join_service(handle);
    }
}

/// Join one service thread; returns false if it panicked
fn join_service(handle: JoinHandle<()>) -> bool {
    if handle.join().is_err() {
        tracing::error!("Service thread panicked");
        return false;
    }
    true
}

/// Join service threads that have already finished
///
/// Returns how many of them panicked.
fn reap_finished(services: &mut Vec<JoinHandle<()>>) -> usize {
    let mut panicked = 0;
    let mut i = 0;
    while i < services.len() {
        if services[i].is_finished() {
            if !join_service(services.swap_remove(i)) {
                panicked += 1;
            }
        } else {
            i += 1;
        }
    }
    panicked
}

/// Run one client: start workers, run the handler, shut down in order
fn service_client(mut handler: Box<dyn ClientHandler>, session: Session) {
    let remote = session.remote_addr();
    let connection = session.connection();

    match connection.start_workers(session.uses_send_queue(), session.uses_recv_queue()) {
        Ok(()) => {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.app_proc(&session)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Handler for {} failed: {}", remote, e),
                Err(_) => tracing::error!("Handler for {} panicked", remote),
            }
        }
        Err(e) => tracing::warn!("Failed to start workers for {}: {}", remote, e),
    }

    connection.shutdown(None);
    if let Some(e) = connection.last_error() {
        tracing::debug!("Client {} closed with error: {}", remote, e);
    }
    tracing::debug!("Client {} done", remote);
}
