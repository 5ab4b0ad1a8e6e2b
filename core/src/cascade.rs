// Cascade Model — the fixed, ordered relay sequence
//
// A cascade is immutable for the lifetime of a session. Position 1 is the
// relay closest to the client; position N is the last relay before the
// exit. All per-hop arithmetic in the engine is driven by how many relays
// are still ahead of a message's current holder.

use crate::config::{ConfigError, RelayDescriptor};

/// One relay of the cascade, with its parsed key material.
#[derive(Debug, Clone)]
pub struct Relay {
    /// TCP address the relay listens on
    pub address: std::net::SocketAddr,
    /// X25519 public key used to seal the establish header for this relay
    pub public_key: [u8; 32],
}

/// The ordered, fixed-length relay list for one session.
#[derive(Debug, Clone)]
pub struct Cascade {
    relays: Vec<Relay>,
}

impl Cascade {
    /// Build a cascade from configuration descriptors, parsing and
    /// length-checking every public key.
    pub fn from_descriptors(descriptors: &[RelayDescriptor]) -> Result<Self, ConfigError> {
        if descriptors.is_empty() {
            return Err(ConfigError::EmptyCascade);
        }
        let mut relays = Vec::with_capacity(descriptors.len());
        for (i, d) in descriptors.iter().enumerate() {
            let bytes = hex::decode(&d.public_key).map_err(|e| ConfigError::InvalidRelayKey {
                position: i + 1,
                reason: e.to_string(),
            })?;
            let public_key: [u8; 32] =
                bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| ConfigError::InvalidRelayKey {
                        position: i + 1,
                        reason: format!("expected 32 bytes, got {}", bytes.len()),
                    })?;
            relays.push(Relay {
                address: d.address,
                public_key,
            });
        }
        Ok(Self { relays })
    }

    /// Number of relays in the cascade.
    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }

    /// Relay at 1-based `position`. Panics on out-of-range positions;
    /// positions are always derived from `len()` by the callers.
    pub fn relay(&self, position: usize) -> &Relay {
        &self.relays[position - 1]
    }

    /// The entry relay the client connects to.
    pub fn first(&self) -> &Relay {
        &self.relays[0]
    }

    /// How many relays are still ahead of the relay at `position`.
    pub fn hops_remaining(&self, position: usize) -> usize {
        self.relays.len() - position
    }
}
