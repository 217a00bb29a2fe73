//! Machine-bound key and the codec that protects the credential store index.
//!
//! The key is PBKDF2 over a fingerprint of the local machine (hostname, home
//! directory, OS, architecture) with a fixed versioned salt. After the first
//! derivation the raw key is written to a key file readable only by the owner,
//! and later runs load that file instead of deriving again.
//!
//! # Security caveat
//!
//! This key is not a secret from anyone with local access: the key file can
//! be read by any process running as the same user, and the key can be
//! re-derived by anyone who can observe the fingerprint inputs on the same
//! host. It protects the credential index against casual exposure (disk
//! images, backups, synced dotfiles), not against a local attacker with the
//! user's privileges.
//!
//! Losing the key file is only recoverable while the fingerprint is
//! unchanged; a renamed host or moved home directory makes data encrypted
//! under the old key permanently unreadable.

use std::fs;
use std::io::Write;
use std::path::Path;

use aes_gcm::aead::{generic_array::GenericArray, AeadInPlace, KeyInit};
use rand::RngCore;

use super::{derive_key, Cipher, CryptoError, IV_LENGTH, KEY_LENGTH, TAG_LENGTH};

/// Fixed salt for machine key derivation. Bump the suffix to rotate the scheme.
pub const MACHINE_KEY_SALT: &str = "cpa-machine-key-salt-v1";

/// Build the fingerprint the machine key is derived from.
pub fn machine_fingerprint() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        "{}{}{}{}",
        host,
        crate::util::home_dir(),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// A 32-byte symmetric key bound to this machine.
#[derive(Clone, PartialEq, Eq)]
pub struct MachineKey([u8; KEY_LENGTH]);

impl std::fmt::Debug for MachineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MachineKey(..)")
    }
}

impl MachineKey {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Derive the key from the current machine fingerprint.
    pub fn derive() -> Result<Self, CryptoError> {
        Self::derive_from(&machine_fingerprint())
    }

    /// Derive the key from an explicit fingerprint string.
    pub fn derive_from(fingerprint: &str) -> Result<Self, CryptoError> {
        derive_key(fingerprint.as_bytes(), MACHINE_KEY_SALT.as_bytes()).map(Self)
    }

    /// Load the key from `path`, deriving and persisting it on first use.
    ///
    /// A key file of the wrong length is replaced with a freshly derived key.
    pub fn load_or_create(path: &Path) -> Result<Self, CryptoError> {
        let key_file_err = |source| CryptoError::KeyFile {
            path: path.display().to_string(),
            source,
        };

        if path.exists() {
            let bytes = fs::read(path).map_err(key_file_err)?;
            if let Ok(raw) = <[u8; KEY_LENGTH]>::try_from(bytes.as_slice()) {
                tracing::debug!("Loaded machine key from {}", path.display());
                return Ok(Self(raw));
            }
            tracing::warn!(
                "Machine key file {} has {} bytes, expected {}; re-deriving",
                path.display(),
                bytes.len(),
                KEY_LENGTH
            );
            fs::remove_file(path).map_err(key_file_err)?;
        }

        let key = Self::derive()?;
        key.write_to(path).map_err(key_file_err)?;
        tracing::info!("Generated machine key at {}", path.display());
        Ok(key)
    }

    fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        file.write_all(&self.0)?;
        file.sync_all()
    }
}

/// AES-256-GCM under a [`MachineKey`], encoded as `hex(iv):hex(tag):hex(ciphertext)`.
#[derive(Debug, Clone)]
pub struct MachineKeyCodec {
    key: MachineKey,
}

impl MachineKeyCodec {
    pub fn new(key: MachineKey) -> Self {
        Self { key }
    }

    fn cipher(&self) -> Result<Cipher, CryptoError> {
        Cipher::new_from_slice(self.key.as_bytes())
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut iv = [0u8; IV_LENGTH];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut buffer = plaintext.as_bytes().to_vec();
        let tag = self
            .cipher()?
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(&buffer)
        ))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let mut parts = encoded.trim().splitn(3, ':');
        let (Some(iv_hex), Some(tag_hex), Some(ct_hex)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::Decode(
                "expected iv:tag:ciphertext".to_string(),
            ));
        };

        let decode = |s: &str| hex::decode(s).map_err(|e| CryptoError::Decode(e.to_string()));
        let iv = decode(iv_hex)?;
        let tag = decode(tag_hex)?;
        let mut buffer = decode(ct_hex)?;

        if iv.len() != IV_LENGTH || tag.len() != TAG_LENGTH {
            return Err(CryptoError::TooShort {
                actual: iv.len() + tag.len(),
                minimum: IV_LENGTH + TAG_LENGTH,
            });
        }

        self.cipher()?
            .decrypt_in_place_detached(
                GenericArray::from_slice(&iv),
                b"",
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(buffer).map_err(|_| CryptoError::InvalidUtf8)
    }
}
