//! Top-level keys.
//!
//! A [`PrivateKey`] is 32 bytes of key material, either drawn at random or
//! derived from a password under a [`KdfSpec`]. The same 32 bytes key the
//! symmetric cipher and act as the X25519 scalar behind the [`PublicKey`].
//!
//! A [`PublicKey`] is 51 bytes: the X25519 public key followed by the KDF
//! spec region. An all-zero region marks a key that is not password based,
//! so the encoding alone tells whether the private half can be re-derived
//! from a password.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use zeroize::Zeroizing;

use crate::crypto::cipher::{SymmetricCipher, KEY_LENGTH};
use crate::crypto::kdf::{KdfSpec, SPEC_LENGTH};
use crate::crypto::{ecc, random_bytes};
use crate::error::{check_length, Result, XipherError};
use crate::registry::{EccTables, KeyRegistry};

/// Private key size in bytes
pub const PRIVATE_KEY_LENGTH: usize = KEY_LENGTH;
/// Public key size in bytes: X25519 key and KDF spec region
pub const PUBLIC_KEY_LENGTH: usize = ecc::KEY_LENGTH + SPEC_LENGTH;

type DerivedKey = Zeroizing<[u8; KEY_LENGTH]>;

enum Secret {
    Random(DerivedKey),
    Password {
        password: Zeroizing<Vec<u8>>,
        spec: KdfSpec,
        key: OnceCell<DerivedKey>,
        // Keys for the same password under other specs, keyed by spec bytes
        spec_keys: Mutex<HashMap<[u8; SPEC_LENGTH], DerivedKey>>,
    },
}

pub struct PrivateKey {
    secret: Secret,
    ecc: EccTables,
    cipher: OnceCell<SymmetricCipher>,
    public_key: OnceCell<PublicKey>,
}

/// Generate a random private key in the global registry.
pub fn new_private_key() -> Result<Arc<PrivateKey>> {
    new_private_key_in(KeyRegistry::global())
}

pub fn new_private_key_in(registry: &KeyRegistry) -> Result<Arc<PrivateKey>> {
    let key = Zeroizing::new(random_bytes::<PRIVATE_KEY_LENGTH>()?);
    parse_private_key_in(registry, &key[..])
}

/// Parse exactly 32 bytes into the global registry.
pub fn parse_private_key(bytes: &[u8]) -> Result<Arc<PrivateKey>> {
    parse_private_key_in(KeyRegistry::global(), bytes)
}

pub fn parse_private_key_in(registry: &KeyRegistry, bytes: &[u8]) -> Result<Arc<PrivateKey>> {
    check_length(bytes, PRIVATE_KEY_LENGTH)?;
    let mut key = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
    key.copy_from_slice(bytes);

    Ok(registry
        .private_keys
        .intern_with(bytes, || PrivateKey::new(registry, Secret::Random(key))))
}

/// Private key for `password` under a fresh default spec.
pub fn new_private_key_for_password(password: &[u8]) -> Result<Arc<PrivateKey>> {
    new_private_key_for_password_in(KeyRegistry::global(), password)
}

pub fn new_private_key_for_password_in(
    registry: &KeyRegistry,
    password: &[u8],
) -> Result<Arc<PrivateKey>> {
    if password.is_empty() {
        return Err(XipherError::InvalidPassword);
    }
    intern_password_key(registry, password, KdfSpec::new()?)
}

/// Private key for `password` under a fresh spec with explicit costs. Zero
/// costs fall back to the defaults.
pub fn new_private_key_for_password_and_spec(
    password: &[u8],
    iterations: u8,
    memory_mib: u8,
    threads: u8,
) -> Result<Arc<PrivateKey>> {
    new_private_key_for_password_and_spec_in(
        KeyRegistry::global(),
        password,
        iterations,
        memory_mib,
        threads,
    )
}

pub fn new_private_key_for_password_and_spec_in(
    registry: &KeyRegistry,
    password: &[u8],
    iterations: u8,
    memory_mib: u8,
    threads: u8,
) -> Result<Arc<PrivateKey>> {
    if password.is_empty() {
        return Err(XipherError::InvalidPassword);
    }
    let spec = KdfSpec::with_params(iterations, memory_mib, threads)?;
    intern_password_key(registry, password, spec)
}

/// Private key for `password` under an existing spec, e.g. one read back
/// from a password-based [`PublicKey`].
pub fn private_key_for_password_and_kdf_spec(
    password: &[u8],
    spec: KdfSpec,
) -> Result<Arc<PrivateKey>> {
    private_key_for_password_and_kdf_spec_in(KeyRegistry::global(), password, spec)
}

/// Keys are interned by password alone. Fails with `KdfSpecMismatch` if the
/// password is already bound to a different spec in `registry`.
pub fn private_key_for_password_and_kdf_spec_in(
    registry: &KeyRegistry,
    password: &[u8],
    spec: KdfSpec,
) -> Result<Arc<PrivateKey>> {
    let key = intern_password_key(registry, password, spec)?;
    if key.spec() != Some(&spec) {
        log::debug!("Password already interned under another KDF spec");
        return Err(XipherError::KdfSpecMismatch);
    }
    Ok(key)
}

// The first spec registered for a password stays bound to it. Constructors
// that draw a fresh salt get the interned key back.
fn intern_password_key(
    registry: &KeyRegistry,
    password: &[u8],
    spec: KdfSpec,
) -> Result<Arc<PrivateKey>> {
    if password.is_empty() {
        return Err(XipherError::InvalidPassword);
    }
    let key = registry.password_keys.intern_with(password, || {
        PrivateKey::new(
            registry,
            Secret::Password {
                password: Zeroizing::new(password.to_vec()),
                spec,
                key: OnceCell::new(),
                spec_keys: Mutex::new(HashMap::new()),
            },
        )
    });
    // Argon2 runs here, outside the registry lock
    key.key()?;
    Ok(key)
}

impl PrivateKey {
    fn new(registry: &KeyRegistry, secret: Secret) -> Self {
        Self {
            secret,
            ecc: registry.ecc.clone(),
            cipher: OnceCell::new(),
            public_key: OnceCell::new(),
        }
    }

    pub fn is_password_based(&self) -> bool {
        matches!(self.secret, Secret::Password { .. })
    }

    /// The KDF spec of a password-based key.
    pub fn spec(&self) -> Option<&KdfSpec> {
        match &self.secret {
            Secret::Random(_) => None,
            Secret::Password { spec, .. } => Some(spec),
        }
    }

    /// Raw key bytes. Password-based keys never export their derived key;
    /// export the password and [`PrivateKey::spec`] instead.
    pub fn bytes(&self) -> Result<[u8; PRIVATE_KEY_LENGTH]> {
        match &self.secret {
            Secret::Random(key) => Ok(**key),
            Secret::Password { .. } => Err(XipherError::KeyUnavailableForPassword),
        }
    }

    fn key(&self) -> Result<&[u8; KEY_LENGTH]> {
        match &self.secret {
            Secret::Random(key) => Ok(&**key),
            Secret::Password {
                password,
                spec,
                key,
                ..
            } => {
                let derived = key.get_or_try_init(|| spec.derive_key(password))?;
                Ok(&**derived)
            }
        }
    }

    pub(crate) fn cipher(&self) -> Result<&SymmetricCipher> {
        self.cipher
            .get_or_try_init(|| SymmetricCipher::new(&self.key()?[..]))
    }

    /// Runs `open` with the cipher for this key's password under `spec`.
    /// A key derived for a spec other than the bound one is cached only once
    /// `open` has succeeded with it, so forged specs never grow the cache.
    pub(crate) fn open_with_spec<T, F>(&self, spec: &KdfSpec, open: F) -> Result<T>
    where
        F: FnOnce(&SymmetricCipher) -> Result<T>,
    {
        let (password, own_spec, spec_keys) = match &self.secret {
            // A random key has no password to re-derive from
            Secret::Random(_) => return Err(XipherError::DecryptionFailed),
            Secret::Password {
                password,
                spec: own_spec,
                spec_keys,
                ..
            } => (password, own_spec, spec_keys),
        };
        if spec == own_spec {
            return open(self.cipher()?);
        }

        let spec_bytes = spec.bytes();
        let cached = spec_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&spec_bytes)
            .map(|key| SymmetricCipher::new(&key[..]));
        if let Some(cipher) = cached {
            return open(&cipher?);
        }

        let derived = spec.derive_key(password)?;
        let opened = open(&SymmetricCipher::new(&derived[..])?)?;
        spec_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(spec_bytes)
            .or_insert(derived);
        Ok(opened)
    }

    /// X25519 key whose scalar is this key's 32 bytes. Crate-internal: for a
    /// password-based key the scalar is the derived key itself.
    pub(crate) fn ecc_private_key(&self) -> Result<Arc<ecc::PrivateKey>> {
        ecc::PrivateKey::intern(&self.ecc, &self.key()?[..])
    }

    /// Public key, computed once.
    pub fn public_key(&self) -> Result<PublicKey> {
        let public = self.public_key.get_or_try_init(|| {
            Ok::<_, XipherError>(PublicKey {
                ecc: self.ecc_private_key()?.public_key(),
                spec: self.spec().copied(),
            })
        })?;
        Ok(public.clone())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("password_based", &self.is_password_based())
            .field("spec", &self.spec())
            .finish_non_exhaustive()
    }
}

/// X25519 public key with the KDF spec of its private half, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    ecc: Arc<ecc::PublicKey>,
    spec: Option<KdfSpec>,
}

impl PublicKey {
    /// Parse exactly 51 bytes using the global registry.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Self::parse_in(KeyRegistry::global(), bytes)
    }

    pub fn parse_in(registry: &KeyRegistry, bytes: &[u8]) -> Result<Self> {
        check_length(bytes, PUBLIC_KEY_LENGTH)?;
        let (curve, region) = bytes.split_at(ecc::KEY_LENGTH);
        let ecc = ecc::PublicKey::parse_in(registry, curve)?;
        let spec = if region.iter().all(|&b| b == 0) {
            None
        } else {
            Some(KdfSpec::parse(region)?)
        };
        Ok(Self { ecc, spec })
    }

    pub fn is_password_based(&self) -> bool {
        self.spec.is_some()
    }

    pub fn spec(&self) -> Option<&KdfSpec> {
        self.spec.as_ref()
    }

    pub fn ecc_public_key(&self) -> &Arc<ecc::PublicKey> {
        &self.ecc
    }

    pub fn bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let mut out = [0u8; PUBLIC_KEY_LENGTH];
        out[..ecc::KEY_LENGTH].copy_from_slice(self.ecc.as_bytes());
        if let Some(spec) = &self.spec {
            out[ecc::KEY_LENGTH..].copy_from_slice(&spec.bytes());
        }
        out
    }
}
