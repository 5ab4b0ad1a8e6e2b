// Running symmetric stream ciphers
//
// One RunningCipher exists per relay per direction for the whole session.
// Every call advances the keystream; it is never reset, so the n-th
// encrypted chunk depends on everything already sent through the same
// cipher. Callers must therefore apply chunks in send order.

use crate::config::SymmetricAlgorithm;
use crate::crypto::CryptoError;
use aes::{Aes128, Aes256};
use cipher::{KeyIvInit, StreamCipher};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

enum Inner {
    Aes128(Aes128Ctr),
    Aes256(Aes256Ctr),
}

/// Owned, mutable streaming-cipher state for one relay direction.
pub struct RunningCipher {
    inner: Inner,
}

impl RunningCipher {
    /// Create a cipher from raw key and IV bytes, length-checked against
    /// the algorithm's parameters.
    pub fn new(algorithm: SymmetricAlgorithm, key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let inner = match algorithm {
            SymmetricAlgorithm::Aes128Ctr => Inner::Aes128(
                Aes128Ctr::new_from_slices(key, iv)
                    .map_err(|e| CryptoError::InvalidKeyLength(e.to_string()))?,
            ),
            SymmetricAlgorithm::Aes256Ctr => Inner::Aes256(
                Aes256Ctr::new_from_slices(key, iv)
                    .map_err(|e| CryptoError::InvalidKeyLength(e.to_string()))?,
            ),
        };
        Ok(Self { inner })
    }

    /// XOR the next keystream bytes into `data`, advancing the state.
    /// Encryption and decryption are the same operation.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        match &mut self.inner {
            Inner::Aes128(c) => c.apply_keystream(data),
            Inner::Aes256(c) => c.apply_keystream(data),
        }
    }
}
