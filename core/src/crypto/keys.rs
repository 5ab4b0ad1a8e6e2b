// Per-relay session key material
//
// Generated once during channel establishment from the OS entropy source,
// held for the channel's lifetime, zeroized when the channel is released.
// The secret block is the plaintext that gets sealed into the establish
// header for one relay: both directions' keys and IVs, the MAC key, a
// timestamp, and the informational message id.

use crate::config::{MacAlgorithm, SymmetricAlgorithm};
use crate::crypto::CryptoError;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Bytes of the timestamp inside the secret block.
pub const TIMESTAMP_LEN: usize = 8;
/// Bytes of the message id copy inside the secret block.
pub const BLOCK_MESSAGE_ID_LEN: usize = 4;
/// Trailing reserved bytes keeping the block length block-aligned.
pub const BLOCK_RESERVED_LEN: usize = 4;

/// Length of the encoded secret block for a given algorithm pair.
pub fn secret_block_len(sym: SymmetricAlgorithm, mac: MacAlgorithm) -> usize {
    2 * sym.key_len()
        + 2 * sym.iv_len()
        + mac.key_len()
        + TIMESTAMP_LEN
        + BLOCK_MESSAGE_ID_LEN
        + BLOCK_RESERVED_LEN
}

/// Symmetric keys, IVs and MAC key for one relay of the cascade.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    /// Client→relay direction key
    pub request_key: Vec<u8>,
    /// Relay→client direction key
    pub reply_key: Vec<u8>,
    /// Client→relay direction IV
    pub request_iv: Vec<u8>,
    /// Relay→client direction IV
    pub reply_iv: Vec<u8>,
    /// Key for the per-hop authentication tag
    pub mac_key: Vec<u8>,
}

impl SessionKeys {
    /// Generate fresh key material from the OS entropy source.
    pub fn generate(sym: SymmetricAlgorithm, mac: MacAlgorithm) -> Self {
        let mut rng = OsRng;
        let mut random = |len: usize| {
            let mut bytes = vec![0u8; len];
            rng.fill_bytes(&mut bytes);
            bytes
        };
        Self {
            request_key: random(sym.key_len()),
            reply_key: random(sym.key_len()),
            request_iv: random(sym.iv_len()),
            reply_iv: random(sym.iv_len()),
            mac_key: random(mac.key_len()),
        }
    }
}

/// Decoded contents of a sealed establish block.
pub struct SecretBlock {
    pub keys: SessionKeys,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    pub message_id: u32,
}

/// Encode the secret block plaintext in its wire order.
pub fn encode_secret_block(
    keys: &SessionKeys,
    timestamp: u64,
    message_id: u32,
) -> Zeroizing<Vec<u8>> {
    let mut block = Zeroizing::new(Vec::with_capacity(
        keys.request_key.len() * 2 + keys.request_iv.len() * 2 + keys.mac_key.len() + 16,
    ));
    block.extend_from_slice(&keys.request_key);
    block.extend_from_slice(&keys.reply_key);
    block.extend_from_slice(&keys.request_iv);
    block.extend_from_slice(&keys.reply_iv);
    block.extend_from_slice(&keys.mac_key);
    block.extend_from_slice(&timestamp.to_be_bytes());
    block.extend_from_slice(&message_id.to_be_bytes());
    block.extend_from_slice(&[0u8; BLOCK_RESERVED_LEN]);
    block
}

/// Parse a secret block back into key material.
///
/// The client never calls this on its own traffic; it exists for the
/// relay-side counterpart and for tests that play the relay role.
pub fn parse_secret_block(
    bytes: &[u8],
    sym: SymmetricAlgorithm,
    mac: MacAlgorithm,
) -> Result<SecretBlock, CryptoError> {
    if bytes.len() != secret_block_len(sym, mac) {
        return Err(CryptoError::MalformedSecretBlock);
    }
    let mut pos = 0;
    let mut take = |len: usize| {
        let slice = &bytes[pos..pos + len];
        pos += len;
        slice.to_vec()
    };
    let request_key = take(sym.key_len());
    let reply_key = take(sym.key_len());
    let request_iv = take(sym.iv_len());
    let reply_iv = take(sym.iv_len());
    let mac_key = take(mac.key_len());
    let mut timestamp_bytes = [0u8; TIMESTAMP_LEN];
    timestamp_bytes.copy_from_slice(&take(TIMESTAMP_LEN));
    let timestamp = u64::from_be_bytes(timestamp_bytes);
    let mut id_bytes = [0u8; BLOCK_MESSAGE_ID_LEN];
    id_bytes.copy_from_slice(&take(BLOCK_MESSAGE_ID_LEN));
    let message_id = u32::from_be_bytes(id_bytes);
    Ok(SecretBlock {
        keys: SessionKeys {
            request_key,
            reply_key,
            request_iv,
            reply_iv,
            mac_key,
        },
        timestamp,
        message_id,
    })
}
