// Message Authentication Helper — per-hop integrity tags
//
// Stateless and reentrant: the client only produces tags for relays to
// check, but the same primitive serves a relay-side implementation, so a
// constant-time verifier lives next to the producer.

use crate::config::MacAlgorithm;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Generate a fresh random MAC key for the given algorithm.
pub fn generate_key(algorithm: MacAlgorithm) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; algorithm.key_len()]);
    OsRng.fill_bytes(&mut key);
    key
}

/// Compute the tag over `data` (the message's non-secret, order-sensitive
/// fields, concatenated by the caller in wire order).
pub fn compute_tag(algorithm: MacAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
    match algorithm {
        MacAlgorithm::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(key)
                .expect("HMAC accepts keys of any length");
            mac.update(data);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Constant-time tag verification.
pub fn verify_tag(algorithm: MacAlgorithm, key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    match algorithm {
        MacAlgorithm::HmacSha256 => {
            let mut mac = HmacSha256::new_from_slice(key)
                .expect("HMAC accepts keys of any length");
            mac.update(data);
            mac.verify_slice(tag).is_ok()
        }
    }
}
