// The per-session onion engine: key material and layer operations
//
// One instance per channel, created at establishment. It generates every
// relay's session keys exactly once and keeps the running request/reply
// ciphers for the whole session. The cipher state is order-dependent:
// layers must be applied in the same order the pump sends and receives,
// which is why only the pump thread ever touches this engine.

use crate::cascade::Cascade;
use crate::config::{MacAlgorithm, SymmetricAlgorithm};
use crate::crypto::keys::{encode_secret_block, SessionKeys};
use crate::crypto::stream_cipher::RunningCipher;
use crate::crypto::{seal, CryptoError};

struct RelayCrypto {
    public_key: [u8; 32],
    keys: SessionKeys,
    request_cipher: RunningCipher,
    reply_cipher: RunningCipher,
}

/// Per-relay cryptographic state for one cascade session.
pub struct OnionCrypto {
    sym: SymmetricAlgorithm,
    relays: Vec<RelayCrypto>,
}

impl OnionCrypto {
    /// Generate session key material for every relay of the cascade and
    /// set up the running ciphers. Called once, at channel establishment.
    pub fn new(
        cascade: &Cascade,
        sym: SymmetricAlgorithm,
        mac: MacAlgorithm,
    ) -> Result<Self, CryptoError> {
        let mut relays = Vec::with_capacity(cascade.len());
        for position in 1..=cascade.len() {
            let keys = SessionKeys::generate(sym, mac);
            let request_cipher = RunningCipher::new(sym, &keys.request_key, &keys.request_iv)?;
            let reply_cipher = RunningCipher::new(sym, &keys.reply_key, &keys.reply_iv)?;
            relays.push(RelayCrypto {
                public_key: cascade.relay(position).public_key,
                keys,
                request_cipher,
                reply_cipher,
            });
        }
        Ok(Self { sym, relays })
    }

    pub fn cascade_len(&self) -> usize {
        self.relays.len()
    }

    pub fn algorithm(&self) -> SymmetricAlgorithm {
        self.sym
    }

    fn relay(&self, position: usize) -> Result<&RelayCrypto, CryptoError> {
        if position == 0 || position > self.relays.len() {
            return Err(CryptoError::UnknownRelay(position));
        }
        Ok(&self.relays[position - 1])
    }

    fn relay_mut(&mut self, position: usize) -> Result<&mut RelayCrypto, CryptoError> {
        if position == 0 || position > self.relays.len() {
            return Err(CryptoError::UnknownRelay(position));
        }
        Ok(&mut self.relays[position - 1])
    }

    /// Session key material for the relay at 1-based `position`.
    pub(crate) fn session_keys(&self, position: usize) -> Result<&SessionKeys, CryptoError> {
        Ok(&self.relay(position)?.keys)
    }

    /// Seal the secret block for one relay with its static public key.
    pub fn seal_secret_block(
        &self,
        position: usize,
        timestamp: u64,
        message_id: u32,
    ) -> Result<Vec<u8>, CryptoError> {
        let relay = self.relay(position)?;
        let block = encode_secret_block(&relay.keys, timestamp, message_id);
        seal::seal(&relay.public_key, &block)
    }

    /// Encrypt the symmetric part of an establish message for one relay:
    /// the payload region, under the relay's running request cipher. This
    /// is that cipher's first use in the session.
    pub fn encrypt_establish_layer(
        &mut self,
        position: usize,
        payload_region: &mut [u8],
    ) -> Result<(), CryptoError> {
        self.relay_mut(position)?
            .request_cipher
            .apply_keystream(payload_region);
        Ok(())
    }

    /// Encrypt one data layer for one relay: the entire message body under
    /// the relay's running request cipher.
    pub fn encrypt_data_layer(
        &mut self,
        position: usize,
        body: &mut [u8],
    ) -> Result<(), CryptoError> {
        self.relay_mut(position)?
            .request_cipher
            .apply_keystream(body);
        Ok(())
    }

    /// Remove every relay's reply layer in one pass, in relay order 1..N.
    /// Each relay added one stream-cipher layer on the way back; only the
    /// client holds all N reply keys, so all layers come off here.
    pub fn decrypt_reply_chain(&mut self, reply: &mut [u8]) {
        for relay in self.relays.iter_mut() {
            relay.reply_cipher.apply_keystream(reply);
        }
    }
}
