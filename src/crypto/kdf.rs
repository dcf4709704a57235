//! Password key derivation (Argon2id).
//!
//! A [`KdfSpec`] is the 19-byte, self-describing set of cost parameters and
//! salt used to turn a password into a 32-byte key:
//!
//! ```text
//! iterations:u8 | memory_mib:u8 | threads:u8 | salt[16]
//! ```
//!
//! A zero cost byte means "use the default" and is resolved at derivation
//! time. The stored bytes are kept exactly as given.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::crypto::cipher::KEY_LENGTH;
use crate::crypto::random_bytes;
use crate::error::{Result, XipherError};

/// Encoded spec size in bytes
pub const SPEC_LENGTH: usize = 19;
/// Salt size in bytes
pub const SALT_LENGTH: usize = 16;

/// Default Argon2 time cost
pub const DEFAULT_ITERATIONS: u8 = 16;
/// Default Argon2 memory cost in MiB
pub const DEFAULT_MEMORY_MIB: u8 = 64;
/// Default Argon2 parallelism
pub const DEFAULT_THREADS: u8 = 1;

/// Argon2id cost parameters and salt.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct KdfSpec {
    iterations: u8,
    memory_mib: u8,
    threads: u8,
    salt: [u8; SALT_LENGTH],
}

impl KdfSpec {
    /// Default costs with a fresh random salt.
    pub fn new() -> Result<Self> {
        Ok(Self {
            iterations: DEFAULT_ITERATIONS,
            memory_mib: DEFAULT_MEMORY_MIB,
            threads: DEFAULT_THREADS,
            salt: random_bytes()?,
        })
    }

    /// Fresh spec with explicit costs. Zero values keep the defaults.
    pub fn with_params(iterations: u8, memory_mib: u8, threads: u8) -> Result<Self> {
        let spec = Self::new()?
            .set_iterations(iterations)
            .set_memory(memory_mib)
            .set_threads(threads);
        spec.params()?;
        Ok(spec)
    }

    pub fn set_iterations(mut self, iterations: u8) -> Self {
        if iterations != 0 {
            self.iterations = iterations;
        }
        self
    }

    pub fn set_memory(mut self, memory_mib: u8) -> Self {
        if memory_mib != 0 {
            self.memory_mib = memory_mib;
        }
        self
    }

    pub fn set_threads(mut self, threads: u8) -> Self {
        if threads != 0 {
            self.threads = threads;
        }
        self
    }

    /// Parse an encoded spec.
    ///
    /// Fails with `KdfSpecParseFailure` unless `bytes` is exactly 19 bytes
    /// and describes parameters Argon2 accepts.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SPEC_LENGTH {
            return Err(XipherError::KdfSpecParseFailure);
        }
        let mut salt = [0u8; SALT_LENGTH];
        salt.copy_from_slice(&bytes[3..]);
        let spec = Self {
            iterations: bytes[0],
            memory_mib: bytes[1],
            threads: bytes[2],
            salt,
        };
        spec.params().map_err(|_| XipherError::KdfSpecParseFailure)?;
        Ok(spec)
    }

    pub fn bytes(&self) -> [u8; SPEC_LENGTH] {
        let mut out = [0u8; SPEC_LENGTH];
        out[0] = self.iterations;
        out[1] = self.memory_mib;
        out[2] = self.threads;
        out[3..].copy_from_slice(&self.salt);
        out
    }

    pub fn iterations(&self) -> u8 {
        or_default(self.iterations, DEFAULT_ITERATIONS)
    }

    pub fn memory_mib(&self) -> u8 {
        or_default(self.memory_mib, DEFAULT_MEMORY_MIB)
    }

    pub fn threads(&self) -> u8 {
        or_default(self.threads, DEFAULT_THREADS)
    }

    pub fn salt(&self) -> &[u8; SALT_LENGTH] {
        &self.salt
    }

    fn params(&self) -> Result<Params> {
        Params::new(
            u32::from(self.memory_mib()) * 1024,
            u32::from(self.iterations()),
            u32::from(self.threads()),
            Some(KEY_LENGTH),
        )
        .map_err(|e| {
            log::debug!("Rejected Argon2 parameters: {}", e);
            XipherError::KeyDerivationFailed
        })
    }

    /// Derive the 32-byte key for `password` under this spec.
    pub fn derive_key(&self, password: &[u8]) -> Result<Zeroizing<[u8; KEY_LENGTH]>> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params()?);
        log::debug!(
            "Deriving password key (t={}, m={} MiB, p={})",
            self.iterations(),
            self.memory_mib(),
            self.threads()
        );

        let mut key = Zeroizing::new([0u8; KEY_LENGTH]);
        argon2
            .hash_password_into(password, &self.salt, &mut key[..])
            .map_err(|_| XipherError::KeyDerivationFailed)?;
        Ok(key)
    }
}

fn or_default(value: u8, default: u8) -> u8 {
    if value == 0 {
        default
    } else {
        value
    }
}

impl fmt::Debug for KdfSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KdfSpec")
            .field("iterations", &self.iterations())
            .field("memory_mib", &self.memory_mib())
            .field("threads", &self.threads())
            .field("salt", &hex::encode(self.salt))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_spec() -> KdfSpec {
        KdfSpec::with_params(1, 1, 1).unwrap()
    }

    #[test]
    fn test_defaults() {
        let spec = KdfSpec::new().unwrap();
        assert_eq!(spec.iterations(), DEFAULT_ITERATIONS);
        assert_eq!(spec.memory_mib(), DEFAULT_MEMORY_MIB);
        assert_eq!(spec.threads(), DEFAULT_THREADS);
        assert_ne!(KdfSpec::new().unwrap().salt(), spec.salt());
    }

    #[test]
    fn test_zero_params_keep_defaults() {
        let spec = KdfSpec::with_params(0, 0, 0).unwrap();
        assert_eq!(spec.iterations(), DEFAULT_ITERATIONS);
        assert_eq!(spec.memory_mib(), DEFAULT_MEMORY_MIB);
        assert_eq!(spec.threads(), DEFAULT_THREADS);

        let spec = KdfSpec::with_params(3, 0, 2).unwrap();
        assert_eq!(spec.iterations(), 3);
        assert_eq!(spec.memory_mib(), DEFAULT_MEMORY_MIB);
        assert_eq!(spec.threads(), 2);
    }

    #[test]
    fn test_bytes_layout() {
        let spec = KdfSpec::with_params(2, 8, 4).unwrap();
        let bytes = spec.bytes();
        assert_eq!(bytes.len(), SPEC_LENGTH);
        assert_eq!(&bytes[..3], &[2, 8, 4]);
        assert_eq!(&bytes[3..], spec.salt());
        assert_eq!(KdfSpec::parse(&bytes).unwrap(), spec);
    }

    #[test]
    fn test_zero_cost_bytes_parse_as_defaults() {
        let mut bytes = [0u8; SPEC_LENGTH];
        bytes[3..].copy_from_slice(&[9u8; SALT_LENGTH]);
        let spec = KdfSpec::parse(&bytes).unwrap();
        assert_eq!(spec.iterations(), DEFAULT_ITERATIONS);
        // Encoding is preserved as given
        assert_eq!(spec.bytes(), bytes);
    }

    #[test]
    fn test_parse_wrong_length() {
        for len in [0usize, 3, 18, 20, 32] {
            assert_eq!(
                KdfSpec::parse(&vec![1u8; len]).unwrap_err(),
                XipherError::KdfSpecParseFailure
            );
        }
    }

    #[test]
    fn test_parse_rejects_params_argon2_refuses() {
        // 1 MiB cannot hold 255 lanes (Argon2 needs 8 KiB per lane)
        let mut bytes = [0u8; SPEC_LENGTH];
        bytes[..3].copy_from_slice(&[1, 1, 255]);
        assert_eq!(
            KdfSpec::parse(&bytes).unwrap_err(),
            XipherError::KdfSpecParseFailure
        );
        assert_eq!(
            KdfSpec::with_params(1, 1, 255).unwrap_err(),
            XipherError::KeyDerivationFailed
        );
    }

    #[test]
    fn test_derivation_deterministic() {
        let spec = cheap_spec();
        let a = spec.derive_key(b"correct horse").unwrap();
        let b = spec.derive_key(b"correct horse").unwrap();
        assert_eq!(*a, *b);

        let parsed = KdfSpec::parse(&spec.bytes()).unwrap();
        assert_eq!(*parsed.derive_key(b"correct horse").unwrap(), *a);
    }

    #[test]
    fn test_derivation_depends_on_password_and_salt() {
        let spec = cheap_spec();
        let other_salt = cheap_spec();
        let key = spec.derive_key(b"password-1").unwrap();
        assert_ne!(*key, *spec.derive_key(b"password-2").unwrap());
        assert_ne!(*key, *other_salt.derive_key(b"password-1").unwrap());
    }
}
