// Transport seam — length-prefixed frames over a synchronous connection
//
// The cascade protocol is strictly half-duplex over one TCP connection to
// the entry relay, so the transport is a blocking request/reply pipe.
// Messages travel as 4-byte big-endian length-prefixed frames; the
// release marker is the empty frame. The trait seam exists so tests can
// substitute an in-memory cascade.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on a peer frame; anything larger is a protocol violation,
/// not a message this client could ever have solicited.
pub const MAX_FRAME_LEN: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer frame of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),
}

/// A connected, message-oriented pipe to the entry relay.
pub trait Transport: Send {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;
    fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError>;
}

/// Factory producing fresh connections; the pump retries it indefinitely
/// with a fixed backoff until one succeeds.
pub type Connector = Box<dyn Fn() -> Result<Box<dyn Transport>, TransportError> + Send>;

/// TCP transport to the entry relay.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self, TransportError> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.stream
            .write_all(&(frame.len() as u32).to_be_bytes())?;
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        Ok(())
    }

    fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut len_bytes = [0u8; 4];
        self.stream.read_exact(&mut len_bytes)?;
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(len));
        }
        let mut frame = vec![0u8; len];
        self.stream.read_exact(&mut frame)?;
        Ok(frame)
    }
}
