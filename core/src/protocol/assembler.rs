// Message Assembler — onion-wrapped wire messages from raw payload bytes
//
// Establish messages carry a sealed key block per hop and are wrapped with
// freshly generated session material; data messages reuse the established
// running ciphers. Wrapping runs from the last relay outward so relay 1
// can strip only its own layer, revealing relay 2's envelope as its
// forwarded payload.

use crate::cascade::Cascade;
use crate::config::{ChannelConfig, MacAlgorithm};
use crate::crypto::keys::SessionKeys;
use crate::crypto::{mac, CryptoError, OnionCrypto};
use crate::wire::layout::RESERVED_LEN;
use crate::wire::{payload, Field, MessageLayout, WireError, WireMessage};
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("payload of {len} bytes exceeds the last relay's capacity of {max}")]
    MessageTooLong { len: usize, max: usize },
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// The MAC input of an establish message: the non-secret order-sensitive
/// fields plus the freshly generated session material. Relays recompute
/// this after opening the sealed block.
pub fn establish_mac_input(
    message_id: u32,
    keys: &SessionKeys,
    timestamp: u64,
    payload_plain: &[u8],
) -> Zeroizing<Vec<u8>> {
    let mut input = Zeroizing::new(Vec::with_capacity(
        4 + keys.request_key.len() * 2 + keys.request_iv.len() * 2 + 8 + payload_plain.len(),
    ));
    input.extend_from_slice(&message_id.to_be_bytes());
    input.extend_from_slice(&keys.request_key);
    input.extend_from_slice(&keys.reply_key);
    input.extend_from_slice(&keys.request_iv);
    input.extend_from_slice(&keys.reply_iv);
    input.extend_from_slice(&timestamp.to_be_bytes());
    input.extend_from_slice(payload_plain);
    input
}

/// The MAC input of a data message: message id, then payload plaintext.
pub fn data_mac_input(message_id: u32, payload_plain: &[u8]) -> Vec<u8> {
    let mut input = Vec::with_capacity(4 + payload_plain.len());
    input.extend_from_slice(&message_id.to_be_bytes());
    input.extend_from_slice(payload_plain);
    input
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Builds complete onion-wrapped messages and strips replies.
pub struct MessageAssembler {
    crypto: OnionCrypto,
    mac_algo: MacAlgorithm,
    establish_layout: MessageLayout,
    data_layout: MessageLayout,
    reply_layout: MessageLayout,
    cascade_len: usize,
    next_message_id: u32,
}

impl MessageAssembler {
    /// Build layouts and generate session material for the whole cascade.
    /// Fails fast on misaligned layouts or bad key material.
    pub fn new(cascade: &Cascade, config: &ChannelConfig) -> Result<Self, AssembleError> {
        let sym = config.symmetric_algorithm;
        let mac_algo = config.mac_algorithm;
        Ok(Self {
            crypto: OnionCrypto::new(cascade, sym, mac_algo)?,
            mac_algo,
            establish_layout: MessageLayout::establish(sym, mac_algo)?,
            data_layout: MessageLayout::data(sym, mac_algo)?,
            reply_layout: MessageLayout::reply(sym)?,
            cascade_len: cascade.len(),
            next_message_id: rand::thread_rng().next_u32(),
        })
    }

    /// Largest application chunk one message can carry: the payload
    /// capacity at the last relay, minus the length prefix.
    pub fn max_chunk_len(&self) -> usize {
        payload::max_message_len(self.data_layout.payload_capacity(0))
    }

    /// Expected length of a reply message on the wire.
    pub fn reply_len(&self) -> usize {
        self.reply_layout.total_len(0)
    }

    fn next_message_id(&mut self) -> u32 {
        let id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);
        id
    }

    fn check_len(&self, raw_payload: &[u8]) -> Result<(), AssembleError> {
        let max = self.max_chunk_len();
        if raw_payload.len() > max {
            return Err(AssembleError::MessageTooLong {
                len: raw_payload.len(),
                max,
            });
        }
        Ok(())
    }

    /// Build the channel-establish message for the whole cascade.
    ///
    /// The raw payload (possibly empty) rides in the innermost layer, so
    /// the first application bytes do not cost an extra round.
    pub fn build_establish(&mut self, raw_payload: &[u8]) -> Result<Vec<u8>, AssembleError> {
        self.check_len(raw_payload)?;
        let timestamp = unix_now();
        let n = self.cascade_len;
        let mut inner: Vec<u8> = Vec::new();
        for position in (1..=n).rev() {
            let hops = n - position;
            let message_id = self.next_message_id();
            let mut msg = WireMessage::new(&self.establish_layout, hops);

            // Innermost layer carries the length-prefixed payload block;
            // outer layers carry the previous ciphertext, which fills the
            // payload field exactly.
            let payload_plain = if position == n {
                payload::encode(raw_payload, self.establish_layout.payload_capacity(hops))?
            } else {
                std::mem::take(&mut inner)
            };

            msg.set(Field::MessageId, &message_id.to_be_bytes())?;
            let mut reserved = [0u8; RESERVED_LEN];
            rand::thread_rng().fill_bytes(&mut reserved);
            msg.set(Field::Reserved, &reserved)?;

            let sealed = self
                .crypto
                .seal_secret_block(position, timestamp, message_id)?;
            msg.set(Field::AsymPart, &sealed)?;

            let keys = self.crypto.session_keys(position)?;
            let signed = establish_mac_input(message_id, keys, timestamp, &payload_plain);
            let tag = mac::compute_tag(self.mac_algo, &keys.mac_key, &signed);
            msg.set(Field::Mac, &tag)?;

            msg.set(Field::Payload, &payload_plain)?;
            self.crypto
                .encrypt_establish_layer(position, msg.get_mut(Field::Payload)?)?;
            inner = msg.into_bytes();
        }
        tracing::debug!(len = inner.len(), relays = n, "assembled establish message");
        Ok(inner)
    }

    /// Build one data message. An empty payload denotes a dummy (cover
    /// traffic) message; it still occupies a full round-trip slot.
    pub fn build_data(&mut self, raw_payload: &[u8]) -> Result<Vec<u8>, AssembleError> {
        self.check_len(raw_payload)?;
        let n = self.cascade_len;
        let mut inner: Vec<u8> = Vec::new();
        for position in (1..=n).rev() {
            let hops = n - position;
            let message_id = self.next_message_id();
            let mut msg = WireMessage::new(&self.data_layout, hops);

            let payload_plain = if position == n {
                payload::encode(raw_payload, self.data_layout.payload_capacity(hops))?
            } else {
                std::mem::take(&mut inner)
            };

            msg.set(Field::MessageId, &message_id.to_be_bytes())?;
            let mut reserved = [0u8; RESERVED_LEN];
            rand::thread_rng().fill_bytes(&mut reserved);
            msg.set(Field::Reserved, &reserved)?;

            let keys = self.crypto.session_keys(position)?;
            let tag = mac::compute_tag(
                self.mac_algo,
                &keys.mac_key,
                &data_mac_input(message_id, &payload_plain),
            );
            msg.set(Field::Mac, &tag)?;

            msg.set(Field::Payload, &payload_plain)?;
            self.crypto
                .encrypt_data_layer(position, msg.as_mut_bytes())?;
            inner = msg.into_bytes();
        }
        Ok(inner)
    }

    /// The release marker ending a channel: a zero-length wire message.
    pub fn build_release(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Strip all reply layers and return the embedded application bytes
    /// (empty for a dummy reply).
    pub fn parse_reply(&mut self, mut reply: Vec<u8>) -> Result<Vec<u8>, AssembleError> {
        let expected = self.reply_len();
        if reply.len() != expected {
            return Err(AssembleError::Wire(WireError::LengthMismatch {
                expected,
                actual: reply.len(),
            }));
        }
        self.crypto.decrypt_reply_chain(&mut reply);
        Ok(payload::decode(&reply)?)
    }
}
