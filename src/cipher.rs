//! Secret encryption contract
//!
//! The store never picks a cipher itself. Callers inject an implementation of
//! [`Cipher`] together with a [`SecretKey`]; values flagged as secret are run
//! through it on the client before they are sent and after they are received.

use crate::{Error, Result};
use rand::RngCore;
use std::fmt;

/// Length of a generated key in bytes (256-bit).
pub const KEY_LEN: usize = 32;

/// Symmetric encryption over the textual `data` of a value.
///
/// Ciphertext must itself be valid UTF-8 text (e.g. hex or base64), since it
/// is stored in the same column as plain values.
pub trait Cipher: Send + Sync {
    fn encrypt(&self, plaintext: &str, key: &[u8]) -> std::result::Result<String, String>;

    fn decrypt(&self, ciphertext: &str, key: &[u8]) -> std::result::Result<String, String>;
}

/// Raw key material supplied by the operator.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex-encoded key
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| Error::InvalidSecretKey(e.to_string()))?;
        if bytes.is_empty() {
            return Err(Error::InvalidSecretKey("key is empty".to_string()));
        }
        Ok(Self(bytes))
    }

    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut key = vec![0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Never print key material.
impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([{} bytes])", self.0.len())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::XorHexCipher;
    use super::*;

    #[test]
    fn test_generated_key_roundtrips_through_hex() {
        let key = SecretKey::generate();
        assert_eq!(key.as_bytes().len(), KEY_LEN);

        let parsed = SecretKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn test_invalid_hex_key() {
        assert!(matches!(
            SecretKey::from_hex("zz-not-hex"),
            Err(Error::InvalidSecretKey(_))
        ));
        assert!(SecretKey::from_hex("").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let key = SecretKey::from_bytes(vec![0xAB; 4]);
        assert_eq!(format!("{:?}", key), "SecretKey([4 bytes])");
    }

    #[test]
    fn test_injected_cipher() {
        let key = SecretKey::from_hex("00112233").unwrap();
        let cipher = XorHexCipher;
        let sealed = cipher.encrypt("hunter2", key.as_bytes()).unwrap();
        assert_ne!(sealed, "hunter2");
        assert_eq!(cipher.decrypt(&sealed, key.as_bytes()).unwrap(), "hunter2");
    }
}
