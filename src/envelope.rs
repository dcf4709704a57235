//! Ciphertext envelope.
//!
//! ```text
//! 0 | nonce[24] | aead                      key-symmetric
//! 1 | kdf_spec[19] | nonce[24] | aead       password-symmetric
//! 2 | ephemeral_pub[32] | nonce[24] | aead  X25519
//! 3 | kem_ct[1568] | nonce[24] | aead       ML-KEM-1024
//! ```
//!
//! Everything before the nonce is the header and is authenticated as
//! associated data. The AEAD plaintext is always a compression envelope.

use crate::compression;
use crate::crypto::cipher::{Sealed, SymmetricCipher, NONCE_LENGTH, TAG_LENGTH};
use crate::crypto::encrypter::Encrypter;
use crate::crypto::kdf::{KdfSpec, SPEC_LENGTH};
use crate::crypto::{asx, ecc, kem};
use crate::error::{Result, XipherError};
use crate::keys;

/// Leading byte of every ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CiphertextKind {
    KeySymmetric = 0,
    PasswordSymmetric = 1,
    Ecc = 2,
    Kyber = 3,
}

impl CiphertextKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::KeySymmetric),
            1 => Some(Self::PasswordSymmetric),
            2 => Some(Self::Ecc),
            3 => Some(Self::Kyber),
            _ => None,
        }
    }

    /// Header size, kind byte included.
    pub fn header_length(self) -> usize {
        1 + match self {
            Self::KeySymmetric => 0,
            Self::PasswordSymmetric => SPEC_LENGTH,
            Self::Ecc => ecc::KEY_LENGTH,
            Self::Kyber => kem::CIPHERTEXT_LENGTH,
        }
    }
}

fn plaintext_envelope(data: &[u8], compress: bool) -> Result<Vec<u8>> {
    if compress {
        compression::compress(data)
    } else {
        Ok(compression::store(data))
    }
}

fn assemble(header: &[u8], sealed: Sealed) -> Vec<u8> {
    let mut out = Vec::with_capacity(header.len() + NONCE_LENGTH + sealed.ciphertext.len());
    out.extend_from_slice(header);
    out.extend_from_slice(&sealed.nonce);
    out.extend_from_slice(&sealed.ciphertext);
    out
}

fn seal_symmetric(
    header: &[u8],
    cipher: &SymmetricCipher,
    data: &[u8],
    compress: bool,
) -> Result<Vec<u8>> {
    let plaintext = plaintext_envelope(data, compress)?;
    let sealed = cipher.encrypt(&plaintext, header)?;
    Ok(assemble(header, sealed))
}

fn seal_asymmetric(
    kind: CiphertextKind,
    encrypter: &Encrypter,
    data: &[u8],
    compress: bool,
) -> Result<Vec<u8>> {
    let mut header = Vec::with_capacity(kind.header_length());
    header.push(kind as u8);
    header.extend_from_slice(encrypter.key_material());

    let plaintext = plaintext_envelope(data, compress)?;
    let sealed = encrypter.seal(&plaintext, &header)?;
    Ok(assemble(&header, sealed))
}

/// A ciphertext split into its parts.
struct Parsed<'a> {
    kind: CiphertextKind,
    header: &'a [u8],
    nonce: &'a [u8],
    body: &'a [u8],
}

impl<'a> Parsed<'a> {
    fn new(ciphertext: &'a [u8]) -> Result<Self> {
        let (&first, _) = ciphertext
            .split_first()
            .ok_or(XipherError::InvalidCiphertext)?;
        let kind = CiphertextKind::from_u8(first).ok_or(XipherError::UnsupportedCiphertext(first))?;

        let header_length = kind.header_length();
        if ciphertext.len() < header_length + NONCE_LENGTH + TAG_LENGTH {
            return Err(XipherError::InvalidCiphertext);
        }
        let (header, rest) = ciphertext.split_at(header_length);
        let (nonce, body) = rest.split_at(NONCE_LENGTH);
        Ok(Self {
            kind,
            header,
            nonce,
            body,
        })
    }

    /// Header bytes after the kind byte.
    fn key_material(&self) -> &'a [u8] {
        &self.header[1..]
    }

    fn open(&self, cipher: &SymmetricCipher) -> Result<Vec<u8>> {
        let plaintext = cipher.decrypt(self.nonce, self.body, self.header)?;
        compression::decompress(&plaintext)
    }
}

impl keys::PrivateKey {
    /// Encrypt `data` with this key directly. Password-based keys embed
    /// their KDF spec so the ciphertext names the derivation it needs.
    pub fn encrypt_symmetric(&self, data: &[u8], compress: bool) -> Result<Vec<u8>> {
        let cipher = self.cipher()?;
        match self.spec() {
            Some(spec) => {
                let mut header = [0u8; 1 + SPEC_LENGTH];
                header[0] = CiphertextKind::PasswordSymmetric as u8;
                header[1..].copy_from_slice(&spec.bytes());
                seal_symmetric(&header, cipher, data, compress)
            }
            None => seal_symmetric(
                &[CiphertextKind::KeySymmetric as u8],
                cipher,
                data,
                compress,
            ),
        }
    }

    /// Decrypt a key-symmetric, password-symmetric or X25519 ciphertext.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let parsed = Parsed::new(ciphertext)?;
        match parsed.kind {
            CiphertextKind::KeySymmetric => parsed.open(self.cipher()?),
            CiphertextKind::PasswordSymmetric => {
                let spec = KdfSpec::parse(parsed.key_material())?;
                self.open_with_spec(&spec, |cipher| parsed.open(cipher))
            }
            CiphertextKind::Ecc => {
                let cipher = self.ecc_private_key()?.decrypter(parsed.key_material())?;
                parsed.open(&cipher)
            }
            CiphertextKind::Kyber => Err(XipherError::UnsupportedCiphertext(parsed.kind as u8)),
        }
    }
}

impl keys::PublicKey {
    /// Encrypt `data` to this key (X25519 ECIES).
    pub fn encrypt(&self, data: &[u8], compress: bool) -> Result<Vec<u8>> {
        let encrypter = self.ecc_public_key().encrypter()?;
        seal_asymmetric(CiphertextKind::Ecc, encrypter, data, compress)
    }
}

impl asx::PublicKey {
    /// Encrypt `data` to this key with its own algorithm.
    pub fn encrypt(&self, data: &[u8], compress: bool) -> Result<Vec<u8>> {
        match self {
            Self::Ecc(key) => seal_asymmetric(CiphertextKind::Ecc, key.encrypter()?, data, compress),
            Self::Kyber(key) => {
                seal_asymmetric(CiphertextKind::Kyber, key.encrypter()?, data, compress)
            }
        }
    }
}

impl asx::PrivateKey {
    /// Decrypt a ciphertext sealed to either of this key's public keys.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let parsed = Parsed::new(ciphertext)?;
        let cipher = match parsed.kind {
            CiphertextKind::Ecc => self.ecc_private_key()?.decrypter(parsed.key_material())?,
            CiphertextKind::Kyber => self.kem_private_key().decrypter(parsed.key_material())?,
            kind => return Err(XipherError::UnsupportedCiphertext(kind as u8)),
        };
        parsed.open(&cipher)
    }
}
