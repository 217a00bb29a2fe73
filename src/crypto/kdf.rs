//! PBKDF2-HMAC-SHA256 key derivation shared by both codecs.

use hmac::Hmac;
use sha2::Sha256;

use super::CryptoError;

/// Key length in bytes (256 bits for AES-256)
pub const KEY_LENGTH: usize = 32;

/// PBKDF2 iteration count used for both password and machine keys.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derive a 32-byte key from `secret` and `salt`.
pub fn derive_key(secret: &[u8], salt: &[u8]) -> Result<[u8; KEY_LENGTH], CryptoError> {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(secret, salt, PBKDF2_ITERATIONS, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic_and_salted() {
        let a = derive_key(b"password", b"salt-one").unwrap();
        let b = derive_key(b"password", b"salt-one").unwrap();
        let c = derive_key(b"password", b"salt-two").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_secret_still_derives() {
        let key = derive_key(b"", b"salt").unwrap();
        assert_eq!(key.len(), KEY_LENGTH);
    }
}
