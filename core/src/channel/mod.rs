// Cascade Channel — the application-facing stream interface
//
// A channel looks like an ordinary byte stream: write() and read() with
// blocking semantics. Underneath, a lazily started pump thread converts
// the stream into fixed-size onion messages, strictly alternating with
// replies, and injects dummy traffic whenever the application is idle.

pub mod pump;
pub mod transport;

pub use pump::{ChannelState, ChannelStats};
pub use transport::{Connector, TcpTransport, Transport, TransportError};

use crate::cascade::Cascade;
use crate::config::{ChannelConfig, ConfigError};
use crate::protocol::{AssembleError, MessageAssembler};
use crate::stream::SharedBuffer;
use pump::{ChannelPump, PumpShared};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("channel closed")]
    Closed,
}

/// A client channel through one fixed relay cascade.
pub struct CascadeChannel {
    send_buf: Arc<SharedBuffer>,
    recv_buf: Arc<SharedBuffer>,
    shared: Arc<PumpShared>,
    pump: Mutex<Option<ChannelPump>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CascadeChannel {
    /// Create a channel that will connect to the cascade's entry relay
    /// over TCP. No connection is made yet; the first `write` starts the
    /// pump, which connects (retrying indefinitely) and establishes the
    /// session.
    pub fn open(config: ChannelConfig) -> Result<Self, ChannelError> {
        let cascade = Cascade::from_descriptors(&config.relays)?;
        let entry = cascade.first().address;
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let connector: Connector = Box::new(move || {
            TcpTransport::connect(entry, timeout)
                .map(|t| Box::new(t) as Box<dyn Transport>)
        });
        Self::with_connector(config, connector)
    }

    /// Like `open`, with a caller-supplied transport factory. This is the
    /// seam integration tests use to run an in-memory cascade.
    pub fn with_connector(
        config: ChannelConfig,
        connector: Connector,
    ) -> Result<Self, ChannelError> {
        config.validate()?;
        let cascade = Cascade::from_descriptors(&config.relays)?;
        let assembler = MessageAssembler::new(&cascade, &config)?;

        let send_buf = Arc::new(SharedBuffer::new(config.send_buffer_size, true));
        let recv_buf = Arc::new(SharedBuffer::new(config.recv_buffer_size, false));
        let shared = Arc::new(PumpShared::new());

        let pump = ChannelPump::new(
            assembler,
            connector,
            Arc::clone(&send_buf),
            Arc::clone(&recv_buf),
            Arc::clone(&shared),
            Duration::from_millis(config.reaction_interval_ms),
            Duration::from_millis(config.connect_retry_ms),
        );

        Ok(Self {
            send_buf,
            recv_buf,
            shared,
            pump: Mutex::new(Some(pump)),
            worker: Mutex::new(None),
        })
    }

    /// Queue outbound bytes, blocking while the send buffer is full. The
    /// first call starts the channel exactly once.
    pub fn write(&self, data: &[u8]) -> Result<(), ChannelError> {
        self.ensure_started();
        self.send_buf
            .write_blocking(data)
            .map_err(|_| ChannelError::Closed)
    }

    /// Read up to `n` bytes, blocking until enough data arrived or the
    /// pump signals that nothing further can be expected right now. An
    /// empty result signals end-of-data, never corruption.
    pub fn read(&self, n: usize) -> Vec<u8> {
        self.recv_buf.read_blocking(n)
    }

    /// Request release. The pump honors it at the top of its loop, sends
    /// the release marker, and exits; this call blocks until then.
    pub fn disconnect(&self) {
        self.shared.request_release();
        let worker = self.worker.lock().take();
        match worker {
            Some(handle) => {
                let _ = handle.join();
            }
            None => {
                // Never started: nothing in flight, close immediately.
                self.shared.set_state(ChannelState::Closed);
                self.send_buf.close();
                self.recv_buf.close();
            }
        }
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.stats()
    }

    /// The fatal error that tore the channel down, if any.
    pub fn failure(&self) -> Option<String> {
        self.shared.failure()
    }

    fn ensure_started(&self) {
        let mut pump = self.pump.lock();
        if self.shared.release_requested() {
            return;
        }
        if let Some(p) = pump.take() {
            let handle = thread::Builder::new()
                .name("cascade-pump".to_string())
                .spawn(move || p.run());
            match handle {
                Ok(handle) => *self.worker.lock() = Some(handle),
                Err(e) => {
                    tracing::error!(error = %e, "failed to spawn pump worker");
                    self.shared.set_state(ChannelState::Closed);
                    self.send_buf.close();
                    self.recv_buf.close();
                }
            }
        }
    }
}

impl Drop for CascadeChannel {
    fn drop(&mut self) {
        // Ask a still-running pump to release; do not block the dropper.
        self.shared.request_release();
    }
}
