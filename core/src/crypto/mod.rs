// Onion Cryptography Engine — per-relay layered encryption and MACs
//
// Owns all per-relay key material for a session: one static public key per
// relay for the establish handshake, and locally generated symmetric
// keys/IVs plus a MAC key per relay for the channel's lifetime. Every
// failure here is fatal to the session; nothing is silently skipped.

pub mod keys;
pub mod mac;
pub mod onion;
pub mod seal;
pub mod stream_cipher;

pub use keys::{parse_secret_block, SecretBlock, SessionKeys};
pub use onion::OnionCrypto;
pub use stream_cipher::RunningCipher;

use thiserror::Error;

/// Cryptographic faults. All of them tear the session down; there is no
/// recovery path that continues with partially working key material.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid relay public key")]
    InvalidPublicKey,
    #[error("invalid key or IV length: {0}")]
    InvalidKeyLength(String),
    #[error("encryption failed")]
    EncryptFailed,
    #[error("decryption failed")]
    DecryptFailed,
    #[error("sealed block is malformed")]
    MalformedSealedBlock,
    #[error("secret block is malformed")]
    MalformedSecretBlock,
    #[error("unknown relay position {0}")]
    UnknownRelay(usize),
}
