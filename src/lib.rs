//! # Xipher
//!
//! **Hybrid public-key encryption with X25519, ML-KEM-1024 and
//! password-derived keys.**
//!
//! Xipher encrypts data to a recipient's public key, to a raw symmetric key,
//! or to a password, without the caller ever handling an AEAD key:
//!
//! - **ECIES over X25519** with a per-public-key memoized encrypter and
//!   counter-based nonces that are never reused
//! - **Post-quantum ECIES over ML-KEM-1024** through a 64-byte hybrid seed
//!   that derives both a classical and a post-quantum sub-key
//! - **Password keys** (Argon2id) whose public keys embed the KDF parameters
//! - **Key interning**: identical key bytes map to one shared key object
//!
//! ## Quick Start
//!
//! ```rust
//! use xipher::{new_private_key, PublicKey};
//!
//! let private_key = new_private_key().unwrap();
//! let public_bytes = private_key.public_key().unwrap().bytes();
//!
//! // The sender only needs the 51 public key bytes
//! let public_key = PublicKey::parse(&public_bytes).unwrap();
//! let ciphertext = public_key.encrypt(b"hello", true).unwrap();
//! assert_eq!(private_key.decrypt(&ciphertext).unwrap(), b"hello");
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`crypto`] | XChaCha20-Poly1305, encrypter, X25519, ML-KEM-1024, hybrid keys, Argon2id |
//! | [`keys`] | Random and password-derived private keys, 51-byte public keys |
//! | [`registry`] | Key interning tables (global or scoped) |
//! | [`envelope`] | Ciphertext layout and encrypt / decrypt for every key family |
//! | [`compression`] | Flag-byte zlib envelope |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `std` | Yes | Standard library support |
//! | `wasm` | No | WebAssembly support (`getrandom/js`) |

// ── Public modules ──────────────────────────────────────────────────────────

/// Primitive adapters and key families: AEAD cipher, memoized encrypter,
/// X25519, ML-KEM-1024, hybrid seed keys, password KDF.
pub mod crypto;

/// Error type shared by every module.
pub mod error;

/// Top-level private and public keys.
pub mod keys;

/// Key interning registries.
pub mod registry;

/// Ciphertext envelope.
pub mod envelope;

/// Flag-byte compression envelope.
pub mod compression;

// ── Re-exports for convenience ──────────────────────────────────────────────

pub use crypto::{asx, Algorithm, Encrypter, KdfSpec, Sealed, SymmetricCipher};

pub use envelope::CiphertextKind;

pub use error::{Result, XipherError};

pub use keys::{
    new_private_key, new_private_key_for_password, new_private_key_for_password_and_spec,
    parse_private_key, private_key_for_password_and_kdf_spec, PrivateKey, PublicKey,
};

pub use registry::{KeyRegistry, RegistryStats};

// ── Library metadata ────────────────────────────────────────────────────────

/// Xipher version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string.
pub fn version() -> &'static str {
    VERSION
}

// ── Tests ───────────────────────────────────────────────────────────────────
