use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XipherError {
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Private key unavailable for password based keys")]
    KeyUnavailableForPassword,
    #[error("Random source failure")]
    RandomSourceFailure,
    #[error("Invalid KDF spec")]
    KdfSpecParseFailure,
    #[error("Password already bound to a different KDF spec")]
    KdfSpecMismatch,
    #[error("Key derivation failed")]
    KeyDerivationFailed,
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid ciphertext")]
    InvalidCiphertext,
    #[error("Unsupported ciphertext kind: {0}")]
    UnsupportedCiphertext(u8),
    #[error("Nonce space exhausted for this encrypter")]
    NonceExhausted,
    #[error("Compression failed: {0}")]
    Compression(String),
}

pub type Result<T> = std::result::Result<T, XipherError>;

/// Rejects `bytes` unless it is exactly `expected` long.
pub(crate) fn check_length(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(XipherError::InvalidKeyLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_length() {
        assert!(check_length(&[0u8; 32], 32).is_ok());
        assert_eq!(
            check_length(&[0u8; 31], 32),
            Err(XipherError::InvalidKeyLength {
                expected: 32,
                actual: 31
            })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = XipherError::InvalidKeyLength {
            expected: 64,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Invalid key length: expected 64, got 3");
        assert_eq!(
            XipherError::UnsupportedCiphertext(9).to_string(),
            "Unsupported ciphertext kind: 9"
        );
    }
}
