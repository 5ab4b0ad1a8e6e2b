// Channel Configuration — immutable inputs for a cascade session
//
// Everything the engine needs is collected here once, validated, and then
// passed by reference into each component. There is no process-wide
// mutable configuration state.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cascade must contain at least one relay")]
    EmptyCascade,
    #[error("relay {position}: invalid public key: {reason}")]
    InvalidRelayKey { position: usize, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidValue(String),
}

/// Symmetric stream cipher used for the per-hop onion layers.
///
/// Each relay direction gets its own running cipher instance; the block
/// size governs the header alignment invariant of the wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymmetricAlgorithm {
    /// AES-128 in counter mode
    Aes128Ctr,
    /// AES-256 in counter mode
    Aes256Ctr,
}

impl SymmetricAlgorithm {
    /// Key length in bytes
    pub fn key_len(&self) -> usize {
        match self {
            SymmetricAlgorithm::Aes128Ctr => 16,
            SymmetricAlgorithm::Aes256Ctr => 32,
        }
    }

    /// Initialization vector length in bytes
    pub fn iv_len(&self) -> usize {
        16
    }

    /// Cipher block length in bytes
    pub fn block_len(&self) -> usize {
        16
    }
}

/// Message authentication algorithm for per-hop integrity tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacAlgorithm {
    /// HMAC with SHA-256 (32-byte tags)
    HmacSha256,
}

impl MacAlgorithm {
    /// MAC key length in bytes
    pub fn key_len(&self) -> usize {
        32
    }

    /// Tag length in bytes
    pub fn tag_len(&self) -> usize {
        32
    }
}

/// A relay endpoint as it appears in configuration files.
///
/// The public key is hex-encoded X25519; it is parsed and length-checked
/// when the cascade is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayDescriptor {
    /// TCP address the relay listens on
    pub address: SocketAddr,
    /// Hex-encoded 32-byte X25519 public key
    pub public_key: String,
}

/// Configuration for one cascade channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Ordered relay list; index 0 is the relay closest to the client
    pub relays: Vec<RelayDescriptor>,
    /// Timeout for a single connection attempt, in milliseconds
    pub connect_timeout_ms: u64,
    /// Fixed backoff between connection attempts, in milliseconds
    pub connect_retry_ms: u64,
    /// Initial send buffer capacity in bytes (bounded; writers block when full)
    pub send_buffer_size: usize,
    /// Initial receive buffer capacity in bytes (grows on demand)
    pub recv_buffer_size: usize,
    /// Pause between request/reply rounds, in milliseconds
    pub reaction_interval_ms: u64,
    /// Symmetric cipher for the onion layers
    pub symmetric_algorithm: SymmetricAlgorithm,
    /// MAC algorithm for per-hop tags
    pub mac_algorithm: MacAlgorithm,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            relays: Vec::new(),
            connect_timeout_ms: 5_000,
            connect_retry_ms: 2_000,
            send_buffer_size: 16_384,
            recv_buffer_size: 16_384,
            reaction_interval_ms: 100,
            symmetric_algorithm: SymmetricAlgorithm::Aes256Ctr,
            mac_algorithm: MacAlgorithm::HmacSha256,
        }
    }
}

impl ChannelConfig {
    /// Validate the configuration.
    ///
    /// Key material is parsed again (and length-checked) when the cascade
    /// is built; layout alignment is re-verified when the wire layouts are
    /// constructed. Either failure aborts channel construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relays.is_empty() {
            return Err(ConfigError::EmptyCascade);
        }
        for (i, relay) in self.relays.iter().enumerate() {
            let bytes = hex::decode(&relay.public_key).map_err(|e| {
                ConfigError::InvalidRelayKey {
                    position: i + 1,
                    reason: e.to_string(),
                }
            })?;
            if bytes.len() != 32 {
                return Err(ConfigError::InvalidRelayKey {
                    position: i + 1,
                    reason: format!("expected 32 bytes, got {}", bytes.len()),
                });
            }
        }
        if self.send_buffer_size == 0 {
            return Err(ConfigError::InvalidValue(
                "send_buffer_size must be > 0".to_string(),
            ));
        }
        if self.recv_buffer_size == 0 {
            return Err(ConfigError::InvalidValue(
                "recv_buffer_size must be > 0".to_string(),
            ));
        }
        if self.connect_retry_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "connect_retry_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
