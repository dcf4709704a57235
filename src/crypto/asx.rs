//! Algorithm-agnostic hybrid keys.
//!
//! A hybrid private key is a 64-byte seed that derives two sub-keys on
//! demand:
//!
//! - an X25519 key whose scalar is `SHA-256(seed)`
//! - an ML-KEM-1024 key pair expanded from the seed
//!
//! A hybrid public key is exactly one of the two, encoded as a one-byte
//! [`Algorithm`] tag followed by the algorithm's public key bytes.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::{ecc, kem, random_bytes};
use crate::error::{check_length, Result, XipherError};
use crate::registry::{EccTables, Interner, KeyRegistry};

/// Hybrid private key (seed) size in bytes
pub const PRIVATE_KEY_LENGTH: usize = 64;
/// Tag byte plus the shortest payload (X25519)
pub const MIN_PUBLIC_KEY_LENGTH: usize = 1 + ecc::KEY_LENGTH;

/// Public key algorithm tag (first byte of an encoded hybrid public key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Algorithm {
    /// X25519
    Ecc = 0,
    /// ML-KEM-1024
    Kyber = 1,
}

impl Algorithm {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Ecc),
            1 => Some(Self::Kyber),
            _ => None,
        }
    }
}

/// 64-byte hybrid seed with lazily derived sub-keys.
pub struct PrivateKey {
    seed: Zeroizing<[u8; PRIVATE_KEY_LENGTH]>,
    ecc: EccTables,
    kem_public_keys: Arc<Interner<kem::PublicKey>>,
    ecc_key: OnceCell<Arc<ecc::PrivateKey>>,
    kem_key: OnceCell<kem::PrivateKey>,
}

impl PrivateKey {
    /// Generate a random seed in the global registry.
    pub fn generate() -> Result<Arc<Self>> {
        Self::generate_in(KeyRegistry::global())
    }

    pub fn generate_in(registry: &KeyRegistry) -> Result<Arc<Self>> {
        let seed = Zeroizing::new(random_bytes::<PRIVATE_KEY_LENGTH>()?);
        Self::parse_in(registry, &seed[..])
    }

    /// Parse exactly 64 bytes into the global registry.
    pub fn parse(bytes: &[u8]) -> Result<Arc<Self>> {
        Self::parse_in(KeyRegistry::global(), bytes)
    }

    pub fn parse_in(registry: &KeyRegistry, bytes: &[u8]) -> Result<Arc<Self>> {
        check_length(bytes, PRIVATE_KEY_LENGTH)?;
        let mut seed = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
        seed.copy_from_slice(bytes);

        Ok(registry.hybrid_keys.intern_with(bytes, || Self {
            seed,
            ecc: registry.ecc.clone(),
            kem_public_keys: Arc::clone(&registry.kem_public_keys),
            ecc_key: OnceCell::new(),
            kem_key: OnceCell::new(),
        }))
    }

    pub fn bytes(&self) -> [u8; PRIVATE_KEY_LENGTH] {
        *self.seed
    }

    /// X25519 sub-key. Derived on first use and interned with every other
    /// X25519 key of the registry.
    pub fn ecc_private_key(&self) -> Result<Arc<ecc::PrivateKey>> {
        let key = self.ecc_key.get_or_try_init(|| {
            let scalar: Zeroizing<[u8; ecc::KEY_LENGTH]> =
                Zeroizing::new(Sha256::digest(&self.seed[..]).into());
            ecc::PrivateKey::intern(&self.ecc, &scalar[..])
        })?;
        Ok(Arc::clone(key))
    }

    /// ML-KEM-1024 sub-key, expanded from the seed on first use. Its public
    /// half is interned with every other ML-KEM key of the registry.
    pub fn kem_private_key(&self) -> &kem::PrivateKey {
        self.kem_key
            .get_or_init(|| kem::PrivateKey::from_seed(&self.seed[..], &self.kem_public_keys))
    }

    pub fn public_key_ecc(&self) -> Result<PublicKey> {
        Ok(PublicKey::Ecc(self.ecc_private_key()?.public_key()))
    }

    pub fn public_key_kyber(&self) -> PublicKey {
        PublicKey::Kyber(self.kem_private_key().public_key())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("asx::PrivateKey")
            .field("ecc_derived", &self.ecc_key.get().is_some())
            .field("kem_derived", &self.kem_key.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Hybrid public key: X25519 or ML-KEM-1024, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ecc(Arc<ecc::PublicKey>),
    Kyber(Arc<kem::PublicKey>),
}

impl PublicKey {
    /// Parse `tag || payload` into the global registry.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_in(KeyRegistry::global(), bytes)
    }

    /// Parse `tag || payload`.
    ///
    /// The tag is checked before any payload decoding, so an X25519 key is
    /// never run through the ML-KEM decoder.
    pub fn parse_in(registry: &KeyRegistry, bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_PUBLIC_KEY_LENGTH {
            return Err(XipherError::InvalidKeyLength {
                expected: MIN_PUBLIC_KEY_LENGTH,
                actual: bytes.len(),
            });
        }
        let payload = &bytes[1..];
        match Algorithm::from_u8(bytes[0]) {
            Some(Algorithm::Ecc) => ecc::PublicKey::parse_in(registry, payload)
                .map(Self::Ecc)
                .map_err(|_| XipherError::InvalidPublicKey),
            Some(Algorithm::Kyber) => {
                if let Some(key) = registry.kem_public_keys.get(payload) {
                    return Ok(Self::Kyber(key));
                }
                let key = kem::PublicKey::parse(payload)?;
                Ok(Self::Kyber(
                    registry.kem_public_keys.intern_with(payload, move || key),
                ))
            }
            None => Err(XipherError::InvalidPublicKey),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Ecc(_) => Algorithm::Ecc,
            Self::Kyber(_) => Algorithm::Kyber,
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let payload: &[u8] = match self {
            Self::Ecc(key) => &key.as_bytes()[..],
            Self::Kyber(key) => key.as_bytes(),
        };
        let mut out = Vec::with_capacity(1 + payload.len());
        out.push(self.algorithm() as u8);
        out.extend_from_slice(payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_tags() {
        assert_eq!(Algorithm::Ecc as u8, 0);
        assert_eq!(Algorithm::Kyber as u8, 1);
        assert_eq!(Algorithm::from_u8(1), Some(Algorithm::Kyber));
        assert_eq!(Algorithm::from_u8(2), None);
    }

    #[test]
    fn test_private_key_length() {
        let registry = KeyRegistry::new();
        for len in [0usize, 32, 63, 65] {
            assert_eq!(
                PrivateKey::parse_in(&registry, &vec![1u8; len]).unwrap_err(),
                XipherError::InvalidKeyLength {
                    expected: PRIVATE_KEY_LENGTH,
                    actual: len
                }
            );
        }
    }

    #[test]
    fn test_private_key_roundtrip_and_interning() {
        let registry = KeyRegistry::new();
        let key = PrivateKey::generate_in(&registry).unwrap();
        let parsed = PrivateKey::parse_in(&registry, &key.bytes()).unwrap();
        assert!(Arc::ptr_eq(&key, &parsed));
        assert_eq!(registry.stats().hybrid_private_keys, 1);
    }

    #[test]
    fn test_ecc_sub_key_is_hashed_seed() {
        let registry = KeyRegistry::new();
        let seed = [5u8; PRIVATE_KEY_LENGTH];
        let key = PrivateKey::parse_in(&registry, &seed).unwrap();

        let expected: [u8; 32] = Sha256::digest(seed).into();
        let ecc_key = key.ecc_private_key().unwrap();
        assert_eq!(ecc_key.bytes(), expected);
        assert!(Arc::ptr_eq(&ecc_key, &key.ecc_private_key().unwrap()));

        // Interned with plain X25519 keys of the same registry
        let direct = ecc::PrivateKey::parse_in(&registry, &expected).unwrap();
        assert!(Arc::ptr_eq(&ecc_key, &direct));
    }

    #[test]
    fn test_sub_keys_deterministic() {
        let seed = [6u8; PRIVATE_KEY_LENGTH];
        let a = PrivateKey::parse_in(&KeyRegistry::new(), &seed).unwrap();
        let b = PrivateKey::parse_in(&KeyRegistry::new(), &seed).unwrap();

        assert_eq!(a.public_key_ecc().unwrap().bytes(), b.public_key_ecc().unwrap().bytes());
        assert_eq!(a.public_key_kyber().bytes(), b.public_key_kyber().bytes());
        assert!(std::ptr::eq(a.kem_private_key(), a.kem_private_key()));
    }

    #[test]
    fn test_public_key_encoding() {
        let registry = KeyRegistry::new();
        let key = PrivateKey::generate_in(&registry).unwrap();

        let ecc_public = key.public_key_ecc().unwrap();
        let ecc_bytes = ecc_public.bytes();
        assert_eq!(ecc_public.algorithm(), Algorithm::Ecc);
        assert_eq!(ecc_bytes.len(), 1 + ecc::KEY_LENGTH);
        assert_eq!(ecc_bytes[0], Algorithm::Ecc as u8);

        let kyber_public = key.public_key_kyber();
        let kyber_bytes = kyber_public.bytes();
        assert_eq!(kyber_public.algorithm(), Algorithm::Kyber);
        assert_eq!(kyber_bytes.len(), 1 + kem::PUBLIC_KEY_LENGTH);
        assert_eq!(kyber_bytes[0], Algorithm::Kyber as u8);
    }

    #[test]
    fn test_public_key_parse_roundtrip() {
        let registry = KeyRegistry::new();
        let key = PrivateKey::generate_in(&registry).unwrap();

        let ecc_public = key.public_key_ecc().unwrap();
        let parsed = PublicKey::parse_in(&registry, &ecc_public.bytes()).unwrap();
        assert_eq!(parsed, ecc_public);

        let kyber_public = key.public_key_kyber();
        let parsed = PublicKey::parse_in(&registry, &kyber_public.bytes()).unwrap();
        assert_eq!(parsed, kyber_public);
    }

    #[test]
    fn test_kyber_public_keys_interned() {
        let registry = KeyRegistry::new();
        let key = PrivateKey::generate_in(&registry).unwrap();
        let bytes = key.public_key_kyber().bytes();

        let first = PublicKey::parse_in(&registry, &bytes).unwrap();
        let second = PublicKey::parse_in(&registry, &bytes).unwrap();
        match (&first, &second, key.public_key_kyber()) {
            (PublicKey::Kyber(a), PublicKey::Kyber(b), PublicKey::Kyber(own)) => {
                assert!(Arc::ptr_eq(a, b));
                assert!(Arc::ptr_eq(a, &own));
                // The memoized encrypter is shared by every parse
                assert!(std::ptr::eq(a.encrypter().unwrap(), b.encrypter().unwrap()));
            }
            _ => panic!("expected Kyber public keys"),
        }
        assert_eq!(registry.stats().kem_public_keys, 1);
    }

    #[test]
    fn test_public_key_parse_rejects_short_input() {
        let registry = KeyRegistry::new();
        assert_eq!(
            PublicKey::parse_in(&registry, &[0u8; 32]).unwrap_err(),
            XipherError::InvalidKeyLength {
                expected: MIN_PUBLIC_KEY_LENGTH,
                actual: 32
            }
        );
    }

    #[test]
    fn test_public_key_tag_dispatch() {
        let registry = KeyRegistry::new();

        let mut unknown = vec![7u8; MIN_PUBLIC_KEY_LENGTH];
        unknown[0] = 2;
        assert_eq!(
            PublicKey::parse_in(&registry, &unknown).unwrap_err(),
            XipherError::InvalidPublicKey
        );

        // An X25519 tag with a Kyber-sized payload is not decoded as ML-KEM
        let mut ecc_tagged = vec![7u8; 1 + kem::PUBLIC_KEY_LENGTH];
        ecc_tagged[0] = Algorithm::Ecc as u8;
        assert_eq!(
            PublicKey::parse_in(&registry, &ecc_tagged).unwrap_err(),
            XipherError::InvalidPublicKey
        );

        let mut kyber_tagged = vec![7u8; MIN_PUBLIC_KEY_LENGTH];
        kyber_tagged[0] = Algorithm::Kyber as u8;
        assert_eq!(
            PublicKey::parse_in(&registry, &kyber_tagged).unwrap_err(),
            XipherError::InvalidPublicKey
        );
    }
}
