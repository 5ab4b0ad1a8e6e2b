// Mixcascade Core — client engine for a fixed mix cascade
//
// Wraps an ordinary byte stream into fixed-size, onion-encrypted messages
// that traverse every relay of the cascade in order. Each relay can strip
// only its own layer. Requests and replies strictly alternate, and dummy
// messages keep the timing pattern alive when the application is idle.
//
// The relay side of the protocol is not implemented here; relays are
// external peers whose addresses and public keys are supplied through the
// channel configuration.

pub mod cascade;
pub mod channel;
pub mod config;
pub mod crypto;
pub mod protocol;
pub mod stream;
pub mod wire;

pub use cascade::{Cascade, Relay};
pub use channel::{
    CascadeChannel, ChannelError, ChannelState, ChannelStats, Connector, TcpTransport, Transport,
    TransportError,
};
pub use config::{
    ChannelConfig, ConfigError, MacAlgorithm, RelayDescriptor, SymmetricAlgorithm,
};
pub use protocol::{AssembleError, MessageAssembler};
pub use wire::{MessageLayout, WireError};
