// Payload block encoding — length prefix plus random padding
//
// A payload block is self-describing: a 4-byte big-endian length prefix,
// the message bytes, then random padding out to the block's full capacity.
// Decoding returns exactly the prefixed number of bytes regardless of what
// the padding contains.

use crate::wire::WireError;
use rand::RngCore;

/// Bytes reserved for the length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Largest message that fits a block of `capacity` bytes.
pub fn max_message_len(capacity: usize) -> usize {
    capacity.saturating_sub(LENGTH_PREFIX_LEN)
}

/// Encode `message` into a block of exactly `capacity` bytes.
pub fn encode(message: &[u8], capacity: usize) -> Result<Vec<u8>, WireError> {
    if capacity < LENGTH_PREFIX_LEN {
        return Err(WireError::InvalidLayout(format!(
            "payload capacity {} is below the length prefix",
            capacity
        )));
    }
    if message.len() > capacity - LENGTH_PREFIX_LEN {
        return Err(WireError::PayloadTooLong {
            len: message.len(),
            capacity,
        });
    }
    let mut block = vec![0u8; capacity];
    block[..LENGTH_PREFIX_LEN].copy_from_slice(&(message.len() as u32).to_be_bytes());
    block[LENGTH_PREFIX_LEN..LENGTH_PREFIX_LEN + message.len()].copy_from_slice(message);
    rand::thread_rng().fill_bytes(&mut block[LENGTH_PREFIX_LEN + message.len()..]);
    Ok(block)
}

/// Decode a block, returning the embedded message with padding stripped.
pub fn decode(block: &[u8]) -> Result<Vec<u8>, WireError> {
    if block.len() < LENGTH_PREFIX_LEN {
        return Err(WireError::PayloadCorrupt(format!(
            "block of {} bytes is below the length prefix",
            block.len()
        )));
    }
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    prefix.copy_from_slice(&block[..LENGTH_PREFIX_LEN]);
    let len = u32::from_be_bytes(prefix) as usize;
    if len > block.len() - LENGTH_PREFIX_LEN {
        return Err(WireError::PayloadCorrupt(format!(
            "length prefix {} exceeds block capacity {}",
            len,
            block.len()
        )));
    }
    Ok(block[LENGTH_PREFIX_LEN..LENGTH_PREFIX_LEN + len].to_vec())
}
