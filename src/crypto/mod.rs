pub mod asx;
pub mod cipher;
pub mod ecc;
pub mod encrypter;
pub mod kdf;
pub mod kem;

pub use asx::Algorithm;
pub use cipher::{Sealed, SymmetricCipher};
pub use encrypter::Encrypter;
pub use kdf::KdfSpec;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Result, XipherError};

/// Draw `N` bytes from the operating system's random source.
///
/// Entropy failure is surfaced, never retried.
pub(crate) fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
        log::error!("OS random source failed: {}", e);
        XipherError::RandomSourceFailure
    })?;
    Ok(bytes)
}
