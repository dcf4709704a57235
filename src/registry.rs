//! Key interning registries.
//!
//! Every key family canonicalizes its raw bytes through an [`Interner`]: the
//! same bytes always map to the same `Arc`, so memoized state (derived public
//! keys, encrypters, derived sub-keys) is shared by every holder of that key.
//!
//! Tables are never evicted. Growth is proportional to the number of distinct
//! keys a registry has seen, which makes a long-lived registry that parses
//! attacker-supplied key bytes an unbounded-growth vector. Processes that
//! parse untrusted keys should use a scoped [`KeyRegistry::new`] and drop it,
//! instead of the process-wide [`KeyRegistry::global`] table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use crate::crypto::{asx, ecc, kem};
use crate::keys;

/// SHA-256 of the raw key bytes. Tables are keyed by fingerprint so secret
/// material is not copied into long-lived map keys.
type Fingerprint = [u8; 32];

static GLOBAL_REGISTRY: Lazy<KeyRegistry> = Lazy::new(KeyRegistry::new);

/// Canonicalization table mapping raw bytes to one shared object.
pub struct Interner<T> {
    kind: &'static str,
    entries: Mutex<HashMap<Fingerprint, Arc<T>>>,
}

impl<T> Interner<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn fingerprint(raw: &[u8]) -> Fingerprint {
        Sha256::digest(raw).into()
    }

    // Entries are inserted fully built, so a poisoned lock still guards a
    // consistent table.
    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the object interned under `raw`, building and registering it
    /// with `build` if this is the first time these bytes are seen.
    pub fn intern_with<F>(&self, raw: &[u8], build: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let fingerprint = Self::fingerprint(raw);
        let mut entries = self.lock();
        if let Some(existing) = entries.get(&fingerprint) {
            return Arc::clone(existing);
        }
        let value = Arc::new(build());
        entries.insert(fingerprint, Arc::clone(&value));
        log::debug!("Interned new {} (table size: {})", self.kind, entries.len());
        value
    }

    /// Looks up `raw` without registering anything.
    pub fn get(&self, raw: &[u8]) -> Option<Arc<T>> {
        self.lock().get(&Self::fingerprint(raw)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The two X25519 tables. Held by every key family that owns a curve sub-key.
#[derive(Clone)]
pub struct EccTables {
    pub(crate) private_keys: Arc<Interner<ecc::PrivateKey>>,
    pub(crate) public_keys: Arc<Interner<ecc::PublicKey>>,
}

impl EccTables {
    fn new() -> Self {
        Self {
            private_keys: Arc::new(Interner::new("X25519 private key")),
            public_keys: Arc::new(Interner::new("X25519 public key")),
        }
    }
}

/// Table sizes of a [`KeyRegistry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub ecc_private_keys: usize,
    pub ecc_public_keys: usize,
    pub hybrid_private_keys: usize,
    pub kem_public_keys: usize,
    pub private_keys: usize,
    pub password_keys: usize,
}

/// A set of interning tables, one per key kind.
///
/// Cloning is cheap and yields a handle to the same tables. A registry lives
/// as long as its last handle or any key created through it.
#[derive(Clone)]
pub struct KeyRegistry {
    pub(crate) ecc: EccTables,
    pub(crate) hybrid_keys: Arc<Interner<asx::PrivateKey>>,
    pub(crate) kem_public_keys: Arc<Interner<kem::PublicKey>>,
    pub(crate) private_keys: Arc<Interner<keys::PrivateKey>>,
    pub(crate) password_keys: Arc<Interner<keys::PrivateKey>>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self {
            ecc: EccTables::new(),
            hybrid_keys: Arc::new(Interner::new("hybrid private key")),
            kem_public_keys: Arc::new(Interner::new("ML-KEM public key")),
            private_keys: Arc::new(Interner::new("private key")),
            password_keys: Arc::new(Interner::new("password key")),
        }
    }

    /// Process-wide registry used by the constructors that take no registry.
    /// Created on first use and never evicted.
    pub fn global() -> &'static KeyRegistry {
        &GLOBAL_REGISTRY
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            ecc_private_keys: self.ecc.private_keys.len(),
            ecc_public_keys: self.ecc.public_keys.len(),
            hybrid_private_keys: self.hybrid_keys.len(),
            kem_public_keys: self.kem_public_keys.len(),
            private_keys: self.private_keys.len(),
            password_keys: self.password_keys.len(),
        }
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_same_bytes_same_object() {
        let table: Interner<Vec<u8>> = Interner::new("test");
        let a = table.intern_with(b"abc", || b"abc".to_vec());
        let b = table.intern_with(b"abc", || b"abc".to_vec());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_different_bytes_different_objects() {
        let table: Interner<Vec<u8>> = Interner::new("test");
        let a = table.intern_with(b"abc", || b"abc".to_vec());
        let b = table.intern_with(b"abd", || b"abd".to_vec());
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_get_does_not_register() {
        let table: Interner<u32> = Interner::new("test");
        assert!(table.get(b"x").is_none());
        assert!(table.is_empty());

        let value = table.intern_with(b"x", || 7);
        assert_eq!(*value, 7);
        assert!(Arc::ptr_eq(&value, &table.get(b"x").unwrap()));
    }

    #[test]
    fn test_concurrent_interning_builds_once() {
        let table: Arc<Interner<u64>> = Arc::new(Interner::new("test"));
        let builds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                let builds = Arc::clone(&builds);
                thread::spawn(move || {
                    table.intern_with(b"shared", || {
                        builds.fetch_add(1, Ordering::SeqCst);
                        42
                    })
                })
            })
            .collect();

        let results: Vec<Arc<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        for r in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], r));
        }
    }

    #[test]
    fn test_registry_handles_share_tables() {
        let registry = KeyRegistry::new();
        let handle = registry.clone();
        ecc::PrivateKey::parse_in(&handle, &[7u8; 32]).unwrap();
        assert_eq!(registry.stats().ecc_private_keys, 1);
        assert_eq!(KeyRegistry::new().stats(), RegistryStats::default());
    }
}
