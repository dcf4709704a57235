//! X25519 keys and the ECIES encrypter.
//!
//! Private and public keys are interned: parsing the same 32 bytes twice in
//! one registry yields the same `Arc`. A private key derives its public key
//! once, and a public key builds its [`Encrypter`] once.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::crypto::cipher::SymmetricCipher;
use crate::crypto::encrypter::Encrypter;
use crate::crypto::random_bytes;
use crate::error::{check_length, Result, XipherError};
use crate::registry::{EccTables, Interner, KeyRegistry};

/// X25519 scalar and point size in bytes
pub const KEY_LENGTH: usize = 32;

/// HKDF info label for X25519 ECIES
const ECIES_LABEL: &[u8] = b"xipher-ecies-x25519-v1";

/// X25519 private key (32-byte scalar).
pub struct PrivateKey {
    secret: StaticSecret,
    public_keys: Arc<Interner<PublicKey>>,
    public_key: OnceCell<Arc<PublicKey>>,
}

/// X25519 public key (32-byte Montgomery u-coordinate).
pub struct PublicKey {
    key: X25519PublicKey,
    encrypter: OnceCell<Encrypter>,
}

/// Diffie-Hellman between `secret` and `peer`, rejecting low-order points.
fn diffie_hellman(secret: &StaticSecret, peer: &[u8; KEY_LENGTH]) -> Result<Zeroizing<[u8; 32]>> {
    let shared = secret.diffie_hellman(&X25519PublicKey::from(*peer));
    if !shared.was_contributory() {
        log::warn!(
            "Rejected low-order X25519 public key {}",
            hex::encode(&peer[..4])
        );
        return Err(XipherError::InvalidPublicKey);
    }
    Ok(Zeroizing::new(shared.to_bytes()))
}

impl PrivateKey {
    /// Generate a random private key in the global registry.
    pub fn generate() -> Result<Arc<Self>> {
        Self::generate_in(KeyRegistry::global())
    }

    pub fn generate_in(registry: &KeyRegistry) -> Result<Arc<Self>> {
        let bytes = Zeroizing::new(random_bytes::<KEY_LENGTH>()?);
        Self::parse_in(registry, &bytes[..])
    }

    /// Parse exactly 32 bytes into the global registry.
    pub fn parse(bytes: &[u8]) -> Result<Arc<Self>> {
        Self::parse_in(KeyRegistry::global(), bytes)
    }

    pub fn parse_in(registry: &KeyRegistry, bytes: &[u8]) -> Result<Arc<Self>> {
        Self::intern(&registry.ecc, bytes)
    }

    pub(crate) fn intern(tables: &EccTables, bytes: &[u8]) -> Result<Arc<Self>> {
        check_length(bytes, KEY_LENGTH)?;
        let mut scalar = Zeroizing::new([0u8; KEY_LENGTH]);
        scalar.copy_from_slice(bytes);

        Ok(tables.private_keys.intern_with(bytes, || Self {
            secret: StaticSecret::from(*scalar),
            public_keys: Arc::clone(&tables.public_keys),
            public_key: OnceCell::new(),
        }))
    }

    /// Raw scalar bytes, exactly as parsed.
    pub fn bytes(&self) -> [u8; KEY_LENGTH] {
        self.secret.to_bytes()
    }

    /// Public key for this scalar (base-point multiplication), computed once
    /// and interned in the registry's public-key table.
    pub fn public_key(&self) -> Arc<PublicKey> {
        let public = self.public_key.get_or_init(|| {
            let point = X25519PublicKey::from(&self.secret);
            PublicKey::intern_point(&self.public_keys, point)
        });
        Arc::clone(public)
    }

    /// Raw X25519 shared secret with `peer_public`.
    pub fn shared_secret(&self, peer_public: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
        check_length(peer_public, KEY_LENGTH)?;
        let mut peer = [0u8; KEY_LENGTH];
        peer.copy_from_slice(peer_public);
        diffie_hellman(&self.secret, &peer)
    }

    /// Recompute the cipher a sender's [`Encrypter`] used, from the
    /// ephemeral public key transmitted with the ciphertext.
    pub fn decrypter(&self, ephemeral_public: &[u8]) -> Result<SymmetricCipher> {
        let shared = self.shared_secret(ephemeral_public)?;
        let recipient = self.public_key();
        SymmetricCipher::from_shared_secret(
            &shared[..],
            &[ECIES_LABEL, ephemeral_public, &recipient.as_bytes()[..]],
        )
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ecc::PrivateKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Parse exactly 32 bytes into the global registry.
    pub fn parse(bytes: &[u8]) -> Result<Arc<Self>> {
        Self::parse_in(KeyRegistry::global(), bytes)
    }

    pub fn parse_in(registry: &KeyRegistry, bytes: &[u8]) -> Result<Arc<Self>> {
        Self::intern(&registry.ecc.public_keys, bytes)
    }

    pub(crate) fn intern(table: &Interner<PublicKey>, bytes: &[u8]) -> Result<Arc<Self>> {
        check_length(bytes, KEY_LENGTH)?;
        let mut point = [0u8; KEY_LENGTH];
        point.copy_from_slice(bytes);
        Ok(Self::intern_point(table, X25519PublicKey::from(point)))
    }

    fn intern_point(table: &Interner<PublicKey>, key: X25519PublicKey) -> Arc<Self> {
        table.intern_with(key.as_bytes(), || Self {
            key,
            encrypter: OnceCell::new(),
        })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        self.key.as_bytes()
    }

    pub fn bytes(&self) -> [u8; KEY_LENGTH] {
        self.key.to_bytes()
    }

    /// The ECIES encrypter for this key.
    ///
    /// The first call draws an ephemeral scalar, agrees a shared secret with
    /// this key and derives the cipher; every later call returns the same
    /// encrypter. Fails with `InvalidPublicKey` for low-order points.
    pub fn encrypter(&self) -> Result<&Encrypter> {
        self.encrypter.get_or_try_init(|| {
            let ephemeral = StaticSecret::from(random_bytes::<KEY_LENGTH>()?);
            let ephemeral_public = X25519PublicKey::from(&ephemeral);
            let shared = diffie_hellman(&ephemeral, self.key.as_bytes())?;
            let cipher = SymmetricCipher::from_shared_secret(
                &shared[..],
                &[
                    ECIES_LABEL,
                    &ephemeral_public.as_bytes()[..],
                    &self.key.as_bytes()[..],
                ],
            )?;
            log::debug!(
                "Created X25519 encrypter for {}",
                hex::encode(&self.key.as_bytes()[..4])
            );
            Encrypter::new(ephemeral_public.to_bytes().to_vec(), cipher)
        })
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.as_bytes().ct_eq(other.key.as_bytes()).into()
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ecc::PublicKey({})", hex::encode(self.key.as_bytes()))
    }
}
