// Stream Buffer Manager — bridging a byte stream onto discrete messages
//
// Two monitored buffers per channel: the application writes into the
// bounded send buffer and reads from the growable receive buffer; the
// pump drains one and fills the other. All blocking is wait/notify on the
// owning buffer's monitor, never polling.

pub mod buffer;

pub use buffer::SharedBuffer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("channel closed")]
    Closed,
}
