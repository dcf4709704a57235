//! ML-KEM-1024 adapter (NIST FIPS 203).
//!
//! Key sizes:
//! - Encapsulation key (public):  1568 bytes
//! - Ciphertext:                  1568 bytes
//! - Shared secret:               32 bytes
//!
//! Key pairs are generated deterministically from a seed: the seed is hashed
//! with a domain-separation suffix and drives a ChaCha20 DRBG that feeds the
//! ML-KEM key generation.

use std::fmt;
use std::sync::Arc;

use ml_kem::kem::{Decapsulate, DecapsulationKey, Encapsulate, EncapsulationKey};
use ml_kem::{Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem1024, MlKem1024Params};
use once_cell::sync::OnceCell;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::crypto::cipher::SymmetricCipher;
use crate::crypto::encrypter::Encrypter;
use crate::crypto::random_bytes;
use crate::error::{Result, XipherError};
use crate::registry::Interner;

/// ML-KEM-1024 encapsulation key (public) size in bytes
pub const PUBLIC_KEY_LENGTH: usize = 1568;
/// ML-KEM-1024 ciphertext size in bytes
pub const CIPHERTEXT_LENGTH: usize = 1568;

/// HKDF info label for ML-KEM ECIES
const KEM_LABEL: &[u8] = b"xipher-ecies-mlkem1024-v1";
/// Domain separation suffix for seed expansion
const SEED_DOMAIN: &[u8] = b"ml-kem-1024";

/// ML-KEM-1024 decapsulation key with its public half.
pub struct PrivateKey {
    dk: DecapsulationKey<MlKem1024Params>,
    public_key: Arc<PublicKey>,
}

/// ML-KEM-1024 encapsulation key.
pub struct PublicKey {
    ek: EncapsulationKey<MlKem1024Params>,
    encoded: Vec<u8>,
    encrypter: OnceCell<Encrypter>,
}

impl PrivateKey {
    /// Derive a key pair from `seed` (deterministic). The public half is
    /// interned in `public_keys`.
    pub(crate) fn from_seed(seed: &[u8], public_keys: &Interner<PublicKey>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(SEED_DOMAIN);
        let drbg_seed: Zeroizing<[u8; 32]> = Zeroizing::new(hasher.finalize().into());

        let mut rng = ChaCha20Rng::from_seed(*drbg_seed);
        let (dk, ek) = MlKem1024::generate(&mut rng);
        let encoded = ek.as_bytes();
        let public_key = public_keys.intern_with(&encoded[..], move || PublicKey::from_key(ek));

        Self { dk, public_key }
    }

    pub fn public_key(&self) -> Arc<PublicKey> {
        Arc::clone(&self.public_key)
    }

    /// Decapsulate `kem_ciphertext` and rebuild the cipher the sender's
    /// [`Encrypter`] used.
    pub fn decrypter(&self, kem_ciphertext: &[u8]) -> Result<SymmetricCipher> {
        if kem_ciphertext.len() != CIPHERTEXT_LENGTH {
            return Err(XipherError::InvalidCiphertext);
        }
        let ct = Ciphertext::<MlKem1024>::try_from(kem_ciphertext)
            .map_err(|_| XipherError::InvalidCiphertext)?;
        let shared_key = self
            .dk
            .decapsulate(&ct)
            .map_err(|_| XipherError::DecryptionFailed)?;
        let shared: &[u8] = shared_key.as_ref();

        SymmetricCipher::from_shared_secret(
            shared,
            &[KEM_LABEL, kem_ciphertext, &self.public_key.encoded[..]],
        )
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("kem::PrivateKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    fn from_key(ek: EncapsulationKey<MlKem1024Params>) -> Self {
        let encoded = ek.as_bytes().to_vec();
        Self {
            ek,
            encoded,
            encrypter: OnceCell::new(),
        }
    }

    /// Parse an encoded ML-KEM-1024 encapsulation key.
    ///
    /// Every coefficient must already be reduced modulo q (FIPS 203 modulus
    /// check): the decoded key has to re-encode to exactly `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_LENGTH {
            return Err(XipherError::InvalidPublicKey);
        }
        let encoded = Encoded::<EncapsulationKey<MlKem1024Params>>::try_from(bytes)
            .map_err(|_| XipherError::InvalidPublicKey)?;
        let key = Self::from_key(EncapsulationKey::<MlKem1024Params>::from_bytes(&encoded));
        if key.encoded != bytes {
            log::warn!("Rejected non-canonical ML-KEM-1024 public key");
            return Err(XipherError::InvalidPublicKey);
        }
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.encoded
    }

    /// The ECIES encrypter for this key: one encapsulation, made on the
    /// first call and reused afterwards.
    pub fn encrypter(&self) -> Result<&Encrypter> {
        self.encrypter.get_or_try_init(|| {
            let mut rng = ChaCha20Rng::from_seed(random_bytes()?);
            let (ct, shared_key) = self
                .ek
                .encapsulate(&mut rng)
                .map_err(|_| XipherError::EncryptionFailed)?;
            let ct_bytes: Vec<u8> = ct.iter().copied().collect();
            let shared: &[u8] = shared_key.as_ref();

            let cipher = SymmetricCipher::from_shared_secret(
                shared,
                &[KEM_LABEL, &ct_bytes[..], &self.encoded[..]],
            )?;
            log::debug!(
                "Created ML-KEM-1024 encrypter for {}",
                hex::encode(&self.encoded[..4])
            );
            Encrypter::new(ct_bytes, cipher)
        })
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.encoded.ct_eq(&other.encoded).into()
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kem::PublicKey({}…)", hex::encode(&self.encoded[..8]))
    }
}
