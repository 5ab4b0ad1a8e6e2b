// Sealed blocks: X25519 ECDH + XChaCha20-Poly1305
//
// Flow:
// 1. Generate an ephemeral X25519 keypair
// 2. ECDH: ephemeral_secret × relay_public → shared_secret
// 3. KDF: Blake3::derive_key(shared_secret) → symmetric key and nonce
// 4. Encrypt: XChaCha20-Poly1305(key, nonce, plaintext)
// 5. Output: ephemeral_public ‖ ciphertext ‖ tag
//
// The nonce is derived from the shared secret; with a fresh ephemeral key
// per seal it is used exactly once, and the opener can reconstruct it
// without it being carried on the wire.

use crate::crypto::CryptoError;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, Zeroizing};

/// Size of the X25519 ephemeral public key prefix.
pub const EPHEMERAL_KEY_LEN: usize = 32;
/// Size of the Poly1305 authentication tag suffix.
pub const SEAL_TAG_LEN: usize = 16;
/// Bytes a sealed block adds on top of its plaintext.
pub const SEAL_OVERHEAD: usize = EPHEMERAL_KEY_LEN + SEAL_TAG_LEN;

const XCHACHA_NONCE_LEN: usize = 24;

/// KDF context strings. Changing either breaks compatibility with every
/// deployed relay.
const KDF_KEY_CONTEXT: &str = "mixcascade v1 establish seal key";
const KDF_NONCE_CONTEXT: &str = "mixcascade v1 establish seal nonce";

fn derive_key(shared_secret: &[u8]) -> [u8; 32] {
    blake3::derive_key(KDF_KEY_CONTEXT, shared_secret)
}

fn derive_nonce(shared_secret: &[u8]) -> [u8; XCHACHA_NONCE_LEN] {
    let hash = blake3::derive_key(KDF_NONCE_CONTEXT, shared_secret);
    let mut nonce = [0u8; XCHACHA_NONCE_LEN];
    nonce.copy_from_slice(&hash[..XCHACHA_NONCE_LEN]);
    nonce
}

/// Seal `plaintext` to the holder of `recipient_public_key`.
///
/// Output length is `plaintext.len() + SEAL_OVERHEAD`, a fixed function of
/// the input length, which is what lets the wire layout treat the sealed
/// block as a fixed-size header field.
pub fn seal(recipient_public_key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let recipient = PublicKey::from(*recipient_public_key);

    let ephemeral_secret = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);
    let shared_secret = ephemeral_secret.diffie_hellman(&recipient);

    let mut key = derive_key(shared_secret.as_bytes());
    let nonce_bytes = derive_nonce(shared_secret.as_bytes());

    let cipher =
        XChaCha20Poly1305::new_from_slice(&key).map_err(|_| CryptoError::EncryptFailed)?;
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CryptoError::EncryptFailed)?;
    key.zeroize();

    let mut sealed = Vec::with_capacity(EPHEMERAL_KEY_LEN + ciphertext.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed block with the recipient's static secret key.
///
/// The client only produces sealed blocks; this is the relay-side
/// counterpart, kept here so both directions share one definition (and so
/// tests can play the relay role).
pub fn open(
    recipient_secret_key: &[u8; 32],
    sealed: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(CryptoError::MalformedSealedBlock);
    }
    let ephemeral_bytes: [u8; 32] = sealed[..EPHEMERAL_KEY_LEN]
        .try_into()
        .map_err(|_| CryptoError::MalformedSealedBlock)?;
    let ephemeral_public = PublicKey::from(ephemeral_bytes);

    let secret = StaticSecret::from(*recipient_secret_key);
    let shared_secret = secret.diffie_hellman(&ephemeral_public);

    let mut key = derive_key(shared_secret.as_bytes());
    let nonce_bytes = derive_nonce(shared_secret.as_bytes());

    let cipher =
        XChaCha20Poly1305::new_from_slice(&key).map_err(|_| CryptoError::DecryptFailed)?;
    let plaintext = cipher
        .decrypt(XNonce::from_slice(&nonce_bytes), &sealed[EPHEMERAL_KEY_LEN..])
        .map_err(|_| CryptoError::DecryptFailed)?;
    key.zeroize();

    Ok(Zeroizing::new(plaintext))
}
