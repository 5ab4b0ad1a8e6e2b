// Wire Layout Engine — byte layout of cascade protocol messages
//
// Pure offset arithmetic: given a message kind and the number of relays
// still ahead of the current holder, compute where every named field
// lives. Holds no mutable state and performs no I/O.

pub mod layout;
pub mod message;
pub mod payload;

pub use layout::{Field, MessageKind, MessageLayout, MessagePart};
pub use message::WireMessage;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("field {field:?} expects {expected} bytes, got {actual}")]
    FieldSizeMismatch {
        field: Field,
        expected: usize,
        actual: usize,
    },
    #[error("{kind:?} message has no field {field:?}")]
    UnknownField { kind: MessageKind, field: Field },
    #[error("header length {header_len} is not a multiple of the cipher block size {block_len}")]
    MisalignedHeader { header_len: usize, block_len: usize },
    #[error("message length {actual} does not match layout length {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("payload of {len} bytes exceeds capacity of {capacity}")]
    PayloadTooLong { len: usize, capacity: usize },
    #[error("payload block is corrupt: {0}")]
    PayloadCorrupt(String),
    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}
