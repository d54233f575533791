use crate::metrics::BRIDGE_CONNECTED;
use crate::protocol::{IncomingMessage, StateMsg};
use crate::publisher::EquipmentSet;
use mixer_core::StateExchange;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Longest inbound line accepted before the client is dropped.
pub const MAX_PENDING_LINE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to bind bridge on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to configure bridge socket: {0}")]
    Socket(#[from] std::io::Error),
}

pub struct BridgeConfig {
    pub bind_addr: String,
    pub publish_interval: Duration,
    pub equipment: EquipmentSet,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7100".to_string(),
            publish_interval: Duration::from_secs(1),
            equipment: EquipmentSet::default(),
        }
    }
}

/// Connection lifecycle notifications, delivered on the bridge thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    ClientConnected { addr: SocketAddr },
    ClientDisconnected { addr: SocketAddr },
}

/// A bound, not yet running bridge. Binding happens on the caller's thread so
/// address errors surface at startup.
pub struct Bridge {
    listener: TcpListener,
    config: BridgeConfig,
}

impl Bridge {
    pub fn bind(config: BridgeConfig) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(&config.bind_addr).map_err(|source| BridgeError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BridgeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves one client at a time until `stop` is raised.
    pub fn run(
        self,
        exchange: Arc<StateExchange>,
        stop: Arc<AtomicBool>,
        mut on_event: impl FnMut(BridgeEvent),
    ) {
        let Bridge { listener, config } = self;
        info!(
            addr = %config.bind_addr,
            equipment = config.equipment.len(),
            "Bridge listening"
        );

        let mut client: Option<(TcpStream, SocketAddr)> = None;
        let mut recv_buf = LineBuffer::new(MAX_PENDING_LINE);
        let mut send_buf: Vec<u8> = Vec::new();
        let mut send_offset: usize = 0;
        let mut last_publish: Option<Instant> = None;
        let mut state_sequence: u64 = 0;

        while !stop.load(Ordering::Relaxed) {
            if client.is_none() {
                match listener.accept() {
                    Ok((stream, addr)) => match stream.set_nonblocking(true) {
                        Ok(()) => {
                            info!(client_addr = %addr, "Bridge client connected");
                            BRIDGE_CONNECTED.set(1.0);
                            on_event(BridgeEvent::ClientConnected { addr });
                            client = Some((stream, addr));
                            last_publish = None;
                        }
                        Err(err) => warn!(error = %err, "Failed to set client nonblocking"),
                    },
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(err) => {
                        warn!("Bridge accept error: {}", err);
                    }
                }
            }

            let mut drop_client = false;
            if let Some((stream, _)) = client.as_mut() {
                let mut temp = [0u8; 1024];
                match stream.read(&mut temp) {
                    Ok(0) => drop_client = true,
                    Ok(n) => {
                        recv_buf.extend(&temp[..n]);
                        while let Some(line) = recv_buf.next_line() {
                            if let Ok(text) = std::str::from_utf8(&line) {
                                handle_line(text.trim());
                            }
                        }
                        if recv_buf.overflowed() {
                            warn!(
                                pending = recv_buf.pending(),
                                limit = MAX_PENDING_LINE,
                                "Bridge client exceeded line limit"
                            );
                            drop_client = true;
                        }
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(err) => {
                        warn!(error = %err, "Bridge read error");
                        drop_client = true;
                    }
                }

                let due = last_publish.map_or(true, |at| at.elapsed() >= config.publish_interval);
                if !drop_client && send_buf.is_empty() && due {
                    state_sequence = state_sequence.wrapping_add(1);
                    let snapshot = exchange.read_state();
                    let msg = StateMsg::new(state_sequence, &snapshot, &config.equipment);
                    match serde_json::to_string(&msg) {
                        Ok(line) => {
                            send_buf = line.into_bytes();
                            send_buf.push(b'\n');
                            send_offset = 0;
                        }
                        Err(err) => warn!(error = %err, "Failed to encode state message"),
                    }
                    last_publish = Some(Instant::now());
                }

                if !drop_client && !send_buf.is_empty() {
                    match stream.write(&send_buf[send_offset..]) {
                        Ok(0) => drop_client = true,
                        Ok(n) => {
                            send_offset += n;
                            if send_offset >= send_buf.len() {
                                send_buf.clear();
                                send_offset = 0;
                            }
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                        Err(err) => {
                            warn!(error = %err, "Bridge write error");
                            drop_client = true;
                        }
                    }
                }
            }

            if drop_client {
                if let Some((_, addr)) = client.take() {
                    info!(client_addr = %addr, "Bridge client disconnected");
                    BRIDGE_CONNECTED.set(0.0);
                    on_event(BridgeEvent::ClientDisconnected { addr });
                }
                recv_buf.clear();
                send_buf.clear();
                send_offset = 0;
            }

            std::thread::sleep(Duration::from_millis(5));
        }

        if let Some((_, addr)) = client.take() {
            BRIDGE_CONNECTED.set(0.0);
            on_event(BridgeEvent::ClientDisconnected { addr });
        }
        info!("Bridge stopped");
    }
}

/// Inbound bytes split into newline-terminated lines. Each byte is scanned
/// once; `overflowed` reports an unterminated line longer than the limit.
struct LineBuffer {
    buf: Vec<u8>,
    scanned: usize,
    limit: usize,
}

impl LineBuffer {
    fn new(limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(4096),
            scanned: 0,
            limit,
        }
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<Vec<u8>> {
        match self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                self.scanned = 0;
                Some(self.buf.drain(..=end).collect())
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    fn pending(&self) -> usize {
        self.buf.len()
    }

    fn overflowed(&self) -> bool {
        self.buf.len() > self.limit
    }

    fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }
}

fn handle_line(line: &str) {
    if line.is_empty() {
        return;
    }
    match IncomingMessage::parse(line) {
        Some(IncomingMessage::Hello(hello)) => {
            if !hello.protocol_version.is_supported() {
                warn!(
                    major = hello.protocol_version.major,
                    minor = hello.protocol_version.minor,
                    "Unsupported protocol version"
                );
                return;
            }
            info!(client_id = ?hello.client_id, "Bridge handshake received");
        }
        None => debug!(line, "Ignoring unrecognised bridge message"),
    }
}
