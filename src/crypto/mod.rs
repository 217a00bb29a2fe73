//! Authenticated encryption for credentials at rest.
//!
//! Two codecs share one primitive (AES-256-GCM with a 16-byte IV) but have
//! different key sources and on-disk layouts:
//!
//! | Codec | Key | Layout |
//! |-------|-----|--------|
//! | [`PasswordCodec`] | PBKDF2(password, random salt) | `base64(salt ‖ iv ‖ tag ‖ ciphertext)` |
//! | [`MachineKeyCodec`] | [`MachineKey`] | `hex(iv):hex(tag):hex(ciphertext)` |
//!
//! The layouts are not interchangeable. Platform API keys in the user config
//! use the password codec; the credential store index uses the machine codec.

mod kdf;
mod machine;
mod password;

use aes_gcm::aead::consts::U16;
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use thiserror::Error;

pub use kdf::{derive_key, KEY_LENGTH, PBKDF2_ITERATIONS};
pub use machine::{machine_fingerprint, MachineKey, MachineKeyCodec, MACHINE_KEY_SALT};
pub use password::PasswordCodec;

/// IV length in bytes. Both codecs use a 128-bit GCM nonce.
pub const IV_LENGTH: usize = 16;

/// GCM authentication tag length in bytes.
pub const TAG_LENGTH: usize = 16;

/// AES-256-GCM with a 16-byte nonce.
pub(crate) type Cipher = AesGcm<Aes256, U16>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encrypted value is not valid encoding: {0}")]
    Decode(String),

    #[error("Encrypted value too short: {actual} bytes, need at least {minimum}")]
    TooShort { actual: usize, minimum: usize },

    /// Authentication failed. A wrong key and a modified blob look the same.
    #[error("Failed to decrypt — check your password")]
    DecryptionFailed,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Decrypted value is not valid UTF-8")]
    InvalidUtf8,

    #[error("Machine key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
