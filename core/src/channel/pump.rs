// Channel Pump — the dedicated worker driving the half-duplex rounds
//
// One pump thread per channel, started lazily on the first write. Each
// round takes at most one message's worth of buffered bytes (or none,
// which becomes a dummy), sends it, blocks for exactly one reply, buffers
// the decrypted result, then pauses for the reaction interval. The pump
// never sends round k+1 before round k's reply is fully processed; the
// relay drops clients that violate this.

use crate::channel::transport::{Connector, Transport, TransportError};
use crate::channel::ChannelError;
use crate::protocol::MessageAssembler;
use crate::stream::SharedBuffer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Lifecycle of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Establishing,
    Streaming,
    Releasing,
    Closed,
}

/// Round and byte counters for one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelStats {
    /// Completed request/reply rounds, including the establish round
    pub rounds: u64,
    /// Messages sent carrying application bytes
    pub data_sent: u64,
    /// Dummy (cover traffic) messages sent
    pub dummy_sent: u64,
    /// Replies carrying application bytes
    pub data_received: u64,
    /// Dummy replies
    pub dummy_received: u64,
    /// Application bytes sent (payloads only, not wire overhead)
    pub bytes_sent: u64,
    /// Application bytes received
    pub bytes_received: u64,
}

/// State shared between the pump thread and the channel facade.
pub(crate) struct PumpShared {
    state: Mutex<ChannelState>,
    release_requested: AtomicBool,
    stats: Mutex<ChannelStats>,
    failure: Mutex<Option<String>>,
}

impl PumpShared {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState::Disconnected),
            release_requested: AtomicBool::new(false),
            stats: Mutex::new(ChannelStats::default()),
            failure: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: ChannelState) {
        *self.state.lock() = state;
        tracing::debug!(?state, "channel state");
    }

    pub fn request_release(&self) {
        self.release_requested.store(true, Ordering::SeqCst);
    }

    pub fn release_requested(&self) -> bool {
        self.release_requested.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> ChannelStats {
        *self.stats.lock()
    }

    pub fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }
}

pub(crate) struct ChannelPump {
    assembler: MessageAssembler,
    connector: Connector,
    send_buf: Arc<SharedBuffer>,
    recv_buf: Arc<SharedBuffer>,
    shared: Arc<PumpShared>,
    reaction_interval: Duration,
    retry_interval: Duration,
}

impl ChannelPump {
    pub fn new(
        assembler: MessageAssembler,
        connector: Connector,
        send_buf: Arc<SharedBuffer>,
        recv_buf: Arc<SharedBuffer>,
        shared: Arc<PumpShared>,
        reaction_interval: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            assembler,
            connector,
            send_buf,
            recv_buf,
            shared,
            reaction_interval,
            retry_interval,
        }
    }

    /// Worker entry point. Any error leaving the loop is fatal to the
    /// session: it is recorded, both buffers are closed so blocked
    /// application calls return, and the channel ends up Closed.
    pub fn run(mut self) {
        if let Err(e) = self.run_loop() {
            tracing::error!(error = %e, "channel torn down");
            *self.shared.failure.lock() = Some(e.to_string());
        }
        self.shared.set_state(ChannelState::Closed);
        self.send_buf.close();
        self.recv_buf.close();
    }

    fn run_loop(&mut self) -> Result<(), ChannelError> {
        self.shared.set_state(ChannelState::Establishing);
        let mut transport = self.connect_with_retry()?;

        // Establish round: the first buffered chunk rides along.
        let chunk = self.send_buf.take_up_to(self.assembler.max_chunk_len());
        let wire = self.assembler.build_establish(&chunk)?;
        let reply = Self::round_trip(transport.as_mut(), &wire)?;
        self.note_sent(&chunk);
        self.handle_reply(reply)?;
        self.shared.set_state(ChannelState::Streaming);
        tracing::info!("channel established");

        loop {
            // Release is cooperative: only honored here, never mid-round.
            if self.shared.release_requested() {
                self.shared.set_state(ChannelState::Releasing);
                transport.send_frame(&self.assembler.build_release())?;
                tracing::info!("channel released");
                return Ok(());
            }

            thread::sleep(self.reaction_interval);

            let chunk = self.send_buf.take_up_to(self.assembler.max_chunk_len());
            let wire = self.assembler.build_data(&chunk)?;
            let reply = Self::round_trip(transport.as_mut(), &wire)?;
            self.note_sent(&chunk);
            self.handle_reply(reply)?;
        }
    }

    /// One synchronous half-duplex round.
    fn round_trip(
        transport: &mut dyn Transport,
        wire: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        transport.send_frame(wire)?;
        transport.recv_frame()
    }

    fn note_sent(&self, chunk: &[u8]) {
        let mut stats = self.shared.stats.lock();
        stats.rounds += 1;
        if chunk.is_empty() {
            stats.dummy_sent += 1;
        } else {
            stats.data_sent += 1;
            stats.bytes_sent += chunk.len() as u64;
        }
    }

    fn handle_reply(&mut self, reply: Vec<u8>) -> Result<(), ChannelError> {
        let message = self.assembler.parse_reply(reply)?;
        let mut stats = self.shared.stats.lock();
        if message.is_empty() {
            stats.dummy_received += 1;
            drop(stats);
            // Nothing further can be expected right now; a blocked reader
            // gets whatever is buffered instead of waiting forever.
            if self.recv_buf.has_waiting_reader() {
                self.recv_buf.force_return();
            }
        } else {
            stats.data_received += 1;
            stats.bytes_received += message.len() as u64;
            drop(stats);
            self.recv_buf.push(&message);
        }
        Ok(())
    }

    /// Connect to the entry relay, retrying indefinitely with the fixed
    /// backoff. A pending release aborts the attempt between retries.
    fn connect_with_retry(&self) -> Result<Box<dyn Transport>, ChannelError> {
        loop {
            if self.shared.release_requested() {
                return Err(ChannelError::Closed);
            }
            match (self.connector)() {
                Ok(transport) => {
                    tracing::debug!("transport connected");
                    return Ok(transport);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_ms = self.retry_interval.as_millis() as u64,
                        "connection failed, retrying"
                    );
                    thread::sleep(self.retry_interval);
                }
            }
        }
    }
}
