// Shared test support: an in-memory relay cascade
//
// Plays the relay side of the protocol with the same primitives the
// client uses, so integration tests can drive a whole cascade without
// sockets: peel establish/data layers, verify MACs, add reply layers,
// and record the send/receive order for half-duplex assertions.

#![allow(dead_code)]

use mixcascade_core::channel::{Connector, Transport, TransportError};
use mixcascade_core::config::{ChannelConfig, MacAlgorithm, RelayDescriptor, SymmetricAlgorithm};
use mixcascade_core::crypto::{mac, parse_secret_block, seal, RunningCipher};
use mixcascade_core::protocol::{data_mac_input, establish_mac_input};
use mixcascade_core::wire::layout::PAYLOAD_CAPACITY;
use mixcascade_core::wire::{payload, Field, MessageLayout, WireMessage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use x25519_dalek::{PublicKey, StaticSecret};

pub const SYM: SymmetricAlgorithm = SymmetricAlgorithm::Aes256Ctr;
pub const MAC: MacAlgorithm = MacAlgorithm::HmacSha256;

/// Transport-level events in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Client sent a frame of this length
    Sent(usize),
    /// Client fetched the paired reply
    Replied,
}

/// One simulated relay.
pub struct RelayState {
    secret: [u8; 32],
    request_cipher: Option<RunningCipher>,
    reply_cipher: Option<RunningCipher>,
    mac_key: Vec<u8>,
}

impl RelayState {
    fn peel_establish(&mut self, bytes: Vec<u8>, hops: usize) -> Vec<u8> {
        let layout = MessageLayout::establish(SYM, MAC).unwrap();
        let mut msg = WireMessage::from_bytes(&layout, hops, bytes).unwrap();

        let opened = seal::open(&self.secret, msg.get(Field::AsymPart).unwrap()).unwrap();
        let block = parse_secret_block(&opened, SYM, MAC).unwrap();
        let mut request_cipher =
            RunningCipher::new(SYM, &block.keys.request_key, &block.keys.request_iv).unwrap();
        request_cipher.apply_keystream(msg.get_mut(Field::Payload).unwrap());

        let message_id =
            u32::from_be_bytes(msg.get(Field::MessageId).unwrap().try_into().unwrap());
        assert_eq!(message_id, block.message_id, "sealed id mismatch");
        let signed = establish_mac_input(
            message_id,
            &block.keys,
            block.timestamp,
            msg.get(Field::Payload).unwrap(),
        );
        assert!(
            mac::verify_tag(MAC, &block.keys.mac_key, &signed, msg.get(Field::Mac).unwrap()),
            "establish MAC rejected"
        );

        self.reply_cipher =
            Some(RunningCipher::new(SYM, &block.keys.reply_key, &block.keys.reply_iv).unwrap());
        self.request_cipher = Some(request_cipher);
        self.mac_key = block.keys.mac_key.clone();
        msg.get(Field::Payload).unwrap().to_vec()
    }

    fn peel_data(&mut self, mut bytes: Vec<u8>, hops: usize) -> Vec<u8> {
        self.request_cipher
            .as_mut()
            .expect("data before establish")
            .apply_keystream(&mut bytes);
        let layout = MessageLayout::data(SYM, MAC).unwrap();
        let msg = WireMessage::from_bytes(&layout, hops, bytes).unwrap();

        let message_id =
            u32::from_be_bytes(msg.get(Field::MessageId).unwrap().try_into().unwrap());
        let signed = data_mac_input(message_id, msg.get(Field::Payload).unwrap());
        assert!(
            mac::verify_tag(MAC, &self.mac_key, &signed, msg.get(Field::Mac).unwrap()),
            "data MAC rejected"
        );
        msg.get(Field::Payload).unwrap().to_vec()
    }

    fn add_reply_layer(&mut self, block: &mut [u8]) {
        self.reply_cipher
            .as_mut()
            .expect("reply before establish")
            .apply_keystream(block);
    }
}

/// The whole simulated cascade plus bookkeeping for assertions.
pub struct CascadeSim {
    relays: Vec<RelayState>,
    established: bool,
    /// Application-level reply payloads, one popped per round; an empty
    /// queue produces dummy replies.
    pub replies: VecDeque<Vec<u8>>,
    /// Application payloads that reached the exit, in order.
    pub received: Vec<Vec<u8>>,
    /// Transport events, in order.
    pub events: Vec<Event>,
    /// Whether the release marker arrived.
    pub released: bool,
}

impl CascadeSim {
    /// Build an n-relay cascade and the matching client configuration,
    /// tuned for fast test rounds.
    pub fn new(n: usize) -> (Arc<Mutex<CascadeSim>>, ChannelConfig) {
        let mut relays = Vec::new();
        let mut descriptors = Vec::new();
        for i in 0..n {
            let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
            let public = PublicKey::from(&secret);
            relays.push(RelayState {
                secret: secret.to_bytes(),
                request_cipher: None,
                reply_cipher: None,
                mac_key: Vec::new(),
            });
            descriptors.push(RelayDescriptor {
                address: format!("127.0.0.1:{}", 7100 + i).parse().unwrap(),
                public_key: hex::encode(public.to_bytes()),
            });
        }
        let config = ChannelConfig {
            relays: descriptors,
            reaction_interval_ms: 5,
            connect_retry_ms: 10,
            symmetric_algorithm: SYM,
            mac_algorithm: MAC,
            ..ChannelConfig::default()
        };
        let sim = CascadeSim {
            relays,
            established: false,
            replies: VecDeque::new(),
            received: Vec::new(),
            events: Vec::new(),
            released: false,
        };
        (Arc::new(Mutex::new(sim)), config)
    }

    /// Process one client frame through every relay; returns the layered
    /// reply frame, or None for the release marker.
    pub fn process_frame(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
        if frame.is_empty() {
            self.released = true;
            return None;
        }
        let n = self.relays.len();
        let mut current = frame.to_vec();
        if !self.established {
            for i in 0..n {
                current = self.relays[i].peel_establish(current, n - (i + 1));
            }
            self.established = true;
        } else {
            for i in 0..n {
                current = self.relays[i].peel_data(current, n - (i + 1));
            }
        }
        let message = payload::decode(&current).expect("exit payload corrupt");
        if !message.is_empty() {
            self.received.push(message);
        }

        let reply_message = self.replies.pop_front().unwrap_or_default();
        let mut block = payload::encode(&reply_message, PAYLOAD_CAPACITY).unwrap();
        for relay in self.relays.iter_mut().rev() {
            relay.add_reply_layer(&mut block);
        }
        Some(block)
    }

    /// All exit-side bytes concatenated in arrival order.
    pub fn received_bytes(&self) -> Vec<u8> {
        self.received.concat()
    }
}

/// In-memory transport wired to a CascadeSim. Enforces half-duplex: a
/// second send before the pending reply is fetched fails the test.
pub struct SimTransport {
    sim: Arc<Mutex<CascadeSim>>,
    pending_reply: Option<Vec<u8>>,
}

impl SimTransport {
    pub fn new(sim: Arc<Mutex<CascadeSim>>) -> Self {
        Self {
            sim,
            pending_reply: None,
        }
    }
}

impl Transport for SimTransport {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        assert!(
            self.pending_reply.is_none(),
            "half-duplex violation: send before the previous reply was consumed"
        );
        let mut sim = self.sim.lock().unwrap();
        sim.events.push(Event::Sent(frame.len()));
        self.pending_reply = sim.process_frame(frame);
        Ok(())
    }

    fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        match self.pending_reply.take() {
            Some(reply) => {
                self.sim.lock().unwrap().events.push(Event::Replied);
                Ok(reply)
            }
            None => Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "no reply pending",
            ))),
        }
    }
}

/// Connector handing out SimTransports for one shared cascade.
pub fn sim_connector(sim: Arc<Mutex<CascadeSim>>) -> Connector {
    Box::new(move || Ok(Box::new(SimTransport::new(Arc::clone(&sim))) as Box<dyn Transport>))
}
