//! Line-oriented transport to the reasoning server.
//!
//! A [`Transport`] owns at most one non-blocking TCP connection. Commands
//! are newline-terminated text; replies are opaque text. When no live
//! connection exists, [`Transport::dispatch`] writes commands to the
//! [`FallbackQueue`] instead, so nothing sent while offline is lost.
//!
//! There is no automatic reconnect: a failed write or read flips the state
//! to [`ConnectionState::Disconnected`] and the caller decides what to do.

pub mod fallback;

use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::BridgeConfig;
use crate::error::{TransportError, TransportResult};

pub use fallback::FallbackQueue;

/// Lifecycle of the server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// Where a dispatched command ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the live socket.
    Sent,
    /// Written to the fallback queue at this path.
    Queued(PathBuf),
}

/// Socket plus fallback channel.
#[derive(Debug)]
pub struct Transport {
    stream: Option<TcpStream>,
    state: ConnectionState,
    endpoint: Option<String>,
    fallback: FallbackQueue,
    connect_timeout: Duration,
    response_window: Duration,
    poll_interval: Duration,
    receive_buffer: usize,
    max_reply_bytes: usize,
}

impl Transport {
    /// Create a disconnected transport using the timing and staging settings of `config`.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            stream: None,
            state: ConnectionState::Disconnected,
            endpoint: None,
            fallback: FallbackQueue::new(config.staging_dir.clone()),
            connect_timeout: config.connect_timeout(),
            response_window: config.response_window(),
            poll_interval: config.poll_interval(),
            receive_buffer: config.receive_buffer.max(1),
            max_reply_bytes: config.max_reply_bytes.max(1),
        }
    }

    /// Open a connection to `host:port`.
    ///
    /// Every resolved address is tried in turn, each bounded by the connect
    /// timeout. The resulting socket is switched to non-blocking mode. On
    /// failure nothing is retried and the transport stays disconnected.
    pub fn connect(&mut self, host: &str, port: u16) -> TransportResult<()> {
        if self.stream.is_some() {
            self.disconnect();
        }
        let endpoint = format!("{host}:{port}");
        self.state = ConnectionState::Connecting;

        match self.open(host, port) {
            Ok(stream) => {
                tracing::info!(endpoint = %endpoint, "connected to reasoning server");
                self.stream = Some(stream);
                self.state = ConnectionState::Connected;
                self.endpoint = Some(endpoint);
                Ok(())
            }
            Err(source) => {
                tracing::warn!(endpoint = %endpoint, error = %source, "connect failed");
                self.state = ConnectionState::Disconnected;
                Err(TransportError::Connect { endpoint, source })
            }
        }
    }

    fn open(&self, host: &str, port: u16) -> std::io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nonblocking(true)?;
                    stream.set_nodelay(true)?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::AddrNotAvailable, "host resolved to no addresses")
        }))
    }

    /// Release the socket. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            tracing::info!(
                endpoint = self.endpoint.as_deref().unwrap_or("?"),
                "disconnected from reasoning server"
            );
        }
        self.state = ConnectionState::Disconnected;
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// `host:port` of the current or most recent connection.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn fallback(&self) -> &FallbackQueue {
        &self.fallback
    }

    fn mark_lost(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            tracing::warn!(
                endpoint = self.endpoint.as_deref().unwrap_or("?"),
                reason,
                "connection lost"
            );
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Write `command` plus a line terminator to the live socket.
    ///
    /// A failed write marks the connection lost.
    pub fn send(&mut self, command: &str) -> TransportResult<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');

        let deadline = Instant::now() + self.response_window.max(self.poll_interval);
        match write_line(stream, line.as_bytes(), deadline, self.poll_interval) {
            Ok(()) => {
                tracing::debug!(command, "sent");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.mark_lost(&message);
                Err(TransportError::RemoteRejected { message })
            }
        }
    }

    /// Send over the socket when connected, otherwise (or when that send
    /// fails) write the command to the fallback queue.
    pub fn dispatch(&mut self, command: &str) -> TransportResult<Delivery> {
        if self.is_connected() {
            match self.send(command) {
                Ok(()) => return Ok(Delivery::Sent),
                Err(e) => tracing::warn!(error = %e, "send failed, queueing to fallback"),
            }
        }
        self.fallback
            .enqueue(command)
            .map(Delivery::Queued)
            .map_err(|e| TransportError::Unavailable {
                message: e.to_string(),
            })
    }

    fn receive_bytes(&mut self) -> Vec<u8> {
        let Some(stream) = self.stream.as_mut() else {
            return Vec::new();
        };
        let mut buf = vec![0u8; self.receive_buffer];
        match stream.read(&mut buf) {
            Ok(0) => {
                self.mark_lost("peer closed the connection");
                Vec::new()
            }
            Ok(n) => {
                tracing::trace!(bytes = n, "received");
                buf.truncate(n);
                buf
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Vec::new()
            }
            Err(e) => {
                self.mark_lost(&e.to_string());
                Vec::new()
            }
        }
    }

    /// Non-blocking read of whatever is currently available.
    ///
    /// Empty means "nothing right now", not "nothing ever".
    pub fn receive(&mut self) -> String {
        String::from_utf8_lossy(&self.receive_bytes()).into_owned()
    }

    /// Send a request and wait up to the configured response window for a reply.
    pub fn evaluate(&mut self, command: &str) -> String {
        self.evaluate_with_timeout(command, self.response_window)
    }

    /// Send a request and poll for a reply until `timeout` elapses.
    ///
    /// Returns as soon as some data arrived plus whatever else is already
    /// buffered, stopping early at the deadline or once `max_reply_bytes`
    /// were collected (the excess is cut off). Empty when disconnected, when
    /// the send fails, or when the server was simply slower than `timeout`.
    pub fn evaluate_with_timeout(&mut self, command: &str, timeout: Duration) -> String {
        if !self.is_connected() {
            return String::new();
        }
        if let Err(e) = self.send(command) {
            tracing::warn!(error = %e, "evaluate: send failed");
            return String::new();
        }

        let deadline = Instant::now() + timeout;
        let mut reply = Vec::new();
        loop {
            let chunk = self.receive_bytes();
            let now = Instant::now();
            if !chunk.is_empty() {
                reply.extend_from_slice(&chunk);
                if reply.len() >= self.max_reply_bytes {
                    tracing::warn!(
                        limit = self.max_reply_bytes,
                        "reply truncated at max_reply_bytes"
                    );
                    reply.truncate(self.max_reply_bytes);
                    break;
                }
                if now >= deadline {
                    break;
                }
                continue;
            }
            // Nothing more buffered after a chunk: the reply is complete.
            if !reply.is_empty() || !self.is_connected() || now >= deadline {
                break;
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
        String::from_utf8_lossy(&reply).into_owned()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn write_line(
    stream: &mut TcpStream,
    bytes: &[u8],
    deadline: Instant,
    poll: Duration,
) -> std::io::Result<()> {
    let mut written = 0;
    while written < bytes.len() {
        match stream.write(&bytes[written..]) {
            Ok(0) => return Err(std::io::Error::new(ErrorKind::WriteZero, "socket closed")),
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Err(std::io::Error::new(
                        ErrorKind::TimedOut,
                        "socket not writable within the response window",
                    ));
                }
                std::thread::sleep(poll);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
