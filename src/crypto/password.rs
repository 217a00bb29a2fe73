//! Password-based codec for user secrets such as platform API keys.
//!
//! Every call to [`PasswordCodec::encrypt`] draws a fresh salt and IV, so the
//! same plaintext and password never produce the same blob twice.

use aes_gcm::aead::{generic_array::GenericArray, AeadInPlace, KeyInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;

use super::{derive_key, Cipher, CryptoError, IV_LENGTH, TAG_LENGTH};

/// Salt length in bytes.
const SALT_LENGTH: usize = 32;

/// Smallest valid decoded blob: salt + iv + tag with an empty ciphertext.
const MIN_BLOB_LENGTH: usize = SALT_LENGTH + IV_LENGTH + TAG_LENGTH;

/// Encrypts with a key derived from a human password.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordCodec;

impl PasswordCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt `plaintext` under `password`.
    ///
    /// Returns `base64(salt ‖ iv ‖ tag ‖ ciphertext)`.
    pub fn encrypt(&self, plaintext: &str, password: &str) -> Result<String, CryptoError> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LENGTH];
        let mut iv = [0u8; IV_LENGTH];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut iv);

        let key = derive_key(password.as_bytes(), &salt)?;
        let cipher =
            Cipher::new_from_slice(&key).map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut combined = Vec::with_capacity(MIN_BLOB_LENGTH + buffer.len());
        combined.extend_from_slice(&salt);
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&tag);
        combined.extend_from_slice(&buffer);

        Ok(BASE64.encode(&combined))
    }

    /// Decrypt a blob produced by [`PasswordCodec::encrypt`].
    ///
    /// Fails on malformed input, a wrong password, or any modification of
    /// the blob. Never returns partial plaintext.
    pub fn decrypt(&self, blob: &str, password: &str) -> Result<String, CryptoError> {
        let trimmed = blob.trim();
        if trimmed.is_empty() {
            return Err(CryptoError::Decode("empty input".to_string()));
        }

        let combined = BASE64
            .decode(trimmed)
            .map_err(|e| CryptoError::Decode(e.to_string()))?;

        if combined.len() < MIN_BLOB_LENGTH {
            return Err(CryptoError::TooShort {
                actual: combined.len(),
                minimum: MIN_BLOB_LENGTH,
            });
        }

        let (salt, rest) = combined.split_at(SALT_LENGTH);
        let (iv, rest) = rest.split_at(IV_LENGTH);
        let (tag, ciphertext) = rest.split_at(TAG_LENGTH);

        let key = derive_key(password.as_bytes(), salt)?;
        let cipher =
            Cipher::new_from_slice(&key).map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(tag),
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(buffer).map_err(|_| CryptoError::InvalidUtf8)
    }
}
