//! XChaCha20-Poly1305 adapter.
//!
//! Every ciphertext produced here is keyed by a 32-byte key, either supplied
//! directly (random and password-derived keys) or expanded from a key
//! agreement shared secret with HKDF-SHA256.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use sha2::Sha256;
use std::fmt;
use zeroize::Zeroizing;

use crate::crypto::random_bytes;
use crate::error::{check_length, Result, XipherError};

/// Symmetric key size in bytes
pub const KEY_LENGTH: usize = 32;
/// XChaCha20 nonce size in bytes
pub const NONCE_LENGTH: usize = 24;
/// Poly1305 tag size in bytes
pub const TAG_LENGTH: usize = 16;

/// Output of one AEAD seal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LENGTH],
    pub ciphertext: Vec<u8>,
}

/// AEAD cipher context bound to one key.
#[derive(Clone)]
pub struct SymmetricCipher {
    aead: XChaCha20Poly1305,
}

impl fmt::Debug for SymmetricCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricCipher").finish_non_exhaustive()
    }
}

impl SymmetricCipher {
    /// Create a cipher from a raw 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self> {
        check_length(key, KEY_LENGTH)?;
        let aead = XChaCha20Poly1305::new_from_slice(key).map_err(|_| {
            XipherError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: key.len(),
            }
        })?;
        Ok(Self { aead })
    }

    /// Create a cipher keyed by HKDF-SHA256(shared_secret) with the
    /// concatenation of `context` as info.
    pub(crate) fn from_shared_secret(shared_secret: &[u8], context: &[&[u8]]) -> Result<Self> {
        let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        hkdf.expand_multi_info(context, &mut key[..])
            .map_err(|_| XipherError::KeyDerivationFailed)?;
        Self::new(&key[..])
    }

    /// Seal `plaintext` under a fresh random nonce.
    ///
    /// Random 24-byte nonces keep the collision probability negligible for
    /// any realistic number of messages under one key.
    pub fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
        let nonce = random_bytes::<NONCE_LENGTH>()?;
        let ciphertext = self.seal_with_nonce(&nonce, plaintext, aad)?;
        Ok(Sealed { nonce, ciphertext })
    }

    /// Seal under a caller-managed nonce. The caller guarantees the nonce is
    /// never reused with this key.
    pub(crate) fn seal_with_nonce(
        &self,
        nonce: &[u8; NONCE_LENGTH],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        self.aead
            .encrypt(XNonce::from_slice(nonce), Payload { msg: plaintext, aad })
            .map_err(|_| XipherError::EncryptionFailed)
    }

    /// Open a ciphertext produced by this key.
    pub fn decrypt(&self, nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != NONCE_LENGTH || ciphertext.len() < TAG_LENGTH {
            return Err(XipherError::InvalidCiphertext);
        }
        self.aead
            .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
            .map_err(|_| XipherError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = SymmetricCipher::new(&[0x42u8; 32]).unwrap();
        let plaintext = b"Hello, Xipher!";

        let sealed = cipher.encrypt(plaintext, b"header").unwrap();
        assert_eq!(sealed.ciphertext.len(), plaintext.len() + TAG_LENGTH);

        let opened = cipher.decrypt(&sealed.nonce, &sealed.ciphertext, b"header").unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_decrypt_with_wrong_key() {
        let cipher1 = SymmetricCipher::new(&[1u8; 32]).unwrap();
        let cipher2 = SymmetricCipher::new(&[2u8; 32]).unwrap();

        let sealed = cipher1.encrypt(b"Secret message", b"").unwrap();
        let result = cipher2.decrypt(&sealed.nonce, &sealed.ciphertext, b"");
        assert_eq!(result, Err(XipherError::DecryptionFailed));
    }

    #[test]
    fn test_associated_data_is_authenticated() {
        let cipher = SymmetricCipher::new(&[3u8; 32]).unwrap();
        let sealed = cipher.encrypt(b"payload", b"header-a").unwrap();
        assert!(cipher.decrypt(&sealed.nonce, &sealed.ciphertext, b"header-b").is_err());
    }

    #[test]
    fn test_invalid_key_length() {
        let result = SymmetricCipher::new(&[0u8; 16]);
        assert_eq!(
            result.unwrap_err(),
            XipherError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        );
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let cipher = SymmetricCipher::new(&[4u8; 32]).unwrap();
        assert_eq!(
            cipher.decrypt(&[0u8; NONCE_LENGTH], &[0u8; 8], b""),
            Err(XipherError::InvalidCiphertext)
        );
        assert_eq!(
            cipher.decrypt(&[0u8; 12], &[0u8; 32], b""),
            Err(XipherError::InvalidCiphertext)
        );
    }

    #[test]
    fn test_shared_secret_context_separates_keys() {
        let shared = [9u8; 32];
        let a = SymmetricCipher::from_shared_secret(&shared, &[&b"label"[..], &b"a"[..]]).unwrap();
        let b = SymmetricCipher::from_shared_secret(&shared, &[&b"label"[..], &b"b"[..]]).unwrap();
        let again = SymmetricCipher::from_shared_secret(&shared, &[&b"label"[..], &b"a"[..]]).unwrap();

        let sealed = a.encrypt(b"data", b"").unwrap();
        assert!(b.decrypt(&sealed.nonce, &sealed.ciphertext, b"").is_err());
        assert_eq!(again.decrypt(&sealed.nonce, &sealed.ciphertext, b"").unwrap(), b"data");
    }
}
