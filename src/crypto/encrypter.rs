//! Memoized ECIES encrypter.
//!
//! An encrypter is created at most once per public-key object. It carries the
//! key-agreement material the recipient needs (an ephemeral X25519 public key
//! or an ML-KEM ciphertext) and the cipher derived from the shared secret.
//! Every message sealed through it reuses that shared secret, so each seal
//! takes a distinct nonce: a random 16-byte prefix drawn once, followed by a
//! 64-bit big-endian counter that is advanced atomically and never wraps.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::crypto::cipher::{Sealed, SymmetricCipher, NONCE_LENGTH};
use crate::crypto::random_bytes;
use crate::error::{Result, XipherError};

const NONCE_PREFIX_LENGTH: usize = 16;

pub struct Encrypter {
    key_material: Vec<u8>,
    cipher: SymmetricCipher,
    nonce_prefix: [u8; NONCE_PREFIX_LENGTH],
    counter: AtomicU64,
}

impl fmt::Debug for Encrypter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encrypter")
            .field("key_material", &hex::encode(&self.key_material[..self.key_material.len().min(8)]))
            .field("messages_sealed", &self.messages_sealed())
            .finish_non_exhaustive()
    }
}

impl Encrypter {
    pub(crate) fn new(key_material: Vec<u8>, cipher: SymmetricCipher) -> Result<Self> {
        Ok(Self {
            key_material,
            cipher,
            nonce_prefix: random_bytes()?,
            counter: AtomicU64::new(0),
        })
    }

    /// Material sent alongside every ciphertext so the recipient can
    /// recompute the shared secret: the ephemeral X25519 public key, or the
    /// ML-KEM ciphertext.
    pub fn key_material(&self) -> &[u8] {
        &self.key_material
    }

    /// Number of nonces handed out so far.
    pub fn messages_sealed(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    fn next_nonce(&self) -> Result<[u8; NONCE_LENGTH]> {
        let counter = self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_add(1))
            .map_err(|_| {
                log::warn!("Encrypter nonce counter exhausted; refusing to reuse a nonce");
                XipherError::NonceExhausted
            })?;

        let mut nonce = [0u8; NONCE_LENGTH];
        nonce[..NONCE_PREFIX_LENGTH].copy_from_slice(&self.nonce_prefix);
        nonce[NONCE_PREFIX_LENGTH..].copy_from_slice(&counter.to_be_bytes());
        Ok(nonce)
    }

    /// Seal `plaintext` with no associated data.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Sealed> {
        self.seal(plaintext, &[])
    }

    /// Seal `plaintext`, authenticating `aad` alongside it.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
        let nonce = self.next_nonce()?;
        let ciphertext = self.cipher.seal_with_nonce(&nonce, plaintext, aad)?;
        Ok(Sealed { nonce, ciphertext })
    }
}
