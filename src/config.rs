//! Configuration for MPL
//!
//! Centralized configuration with sensible defaults.

/// Main configuration shared by connectors and responders
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Responder Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Listen backlog handed to the OS
    pub backlog: i32,

    /// Total clients to serve before the accept loop exits (None = forever)
    pub max_clients: Option<usize>,

    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Run a dedicated send worker fed by the send queue
    pub use_send_queue: bool,

    /// Run a dedicated receive worker feeding the receive queue
    pub use_recv_queue: bool,

    /// Disable Nagle's algorithm on data sockets
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Connector Configuration
    // -------------------------------------------------------------------------
    /// Connection attempts made by `connect_with_retry` callers
    pub connect_retries: u32,

    /// Seconds to wait between failed connection attempts
    pub retry_wait_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            backlog: 20,
            max_clients: None,
            use_send_queue: true,
            use_recv_queue: true,
            nodelay: true,
            connect_retries: 10,
            retry_wait_secs: 1,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the listen backlog
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.config.backlog = backlog;
        self
    }

    /// Set the client limit (None runs forever)
    pub fn max_clients(mut self, count: Option<usize>) -> Self {
        self.config.max_clients = count;
        self
    }

    /// Enable or disable the send worker
    pub fn use_send_queue(mut self, enabled: bool) -> Self {
        self.config.use_send_queue = enabled;
        self
    }

    /// Enable or disable the receive worker
    pub fn use_recv_queue(mut self, enabled: bool) -> Self {
        self.config.use_recv_queue = enabled;
        self
    }

    /// Enable or disable both workers at once
    pub fn use_queues(self, enabled: bool) -> Self {
        self.use_send_queue(enabled).use_recv_queue(enabled)
    }

    /// Set TCP_NODELAY on data sockets
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the number of connection attempts
    pub fn connect_retries(mut self, retries: u32) -> Self {
        self.config.connect_retries = retries;
        self
    }

    /// Set the delay between connection attempts (in seconds)
    pub fn retry_wait_secs(mut self, secs: u64) -> Self {
        self.config.retry_wait_secs = secs;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Convert the `-1 = unbounded` client count convention into a limit
pub fn max_clients_from_count(count: i64) -> crate::Result<Option<usize>> {
    match count {
        -1 => Ok(None),
        n if n < -1 => Err(crate::MplError::Config(format!(
            "max clients must be -1 (unbounded) or non-negative, got {}",
            n
        ))),
        n => Ok(Some(n as usize)),
    }
}
