use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{self, Argon2, Params};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::storage::{KeyValueStore, StorageError};

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
/// Magic bytes prepended to plaintext before encryption.
/// On decrypt, we check for these to validate the passphrase.
const MAGIC: &[u8] = b"CYKEL_V1";

/// Salt for the store key, kept unencrypted next to the data.
pub const SALT_KEY: &str = "kdf_salt";
/// Sealed marker used to reject a wrong passphrase before any data is read.
pub const CHECK_KEY: &str = "kdf_check";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed: wrong passphrase or corrupted data")]
    Decryption,
    #[error("invalid data format")]
    InvalidFormat,
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// A derived AES-256-GCM key. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Cipher {
    key: [u8; KEY_LEN],
}

impl Cipher {
    /// Derive a 256-bit key from a passphrase and salt using Argon2id.
    pub fn derive(passphrase: &str, salt: &[u8], params: &KdfParams) -> Result<Self, CryptoError> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|_| CryptoError::KeyDerivation)?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|_| CryptoError::KeyDerivation)?;

        Ok(Self { key })
    }

    /// Returns: nonce (12) || ciphertext
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::Encryption)?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut payload = Vec::with_capacity(MAGIC.len() + plaintext.len());
        payload.extend_from_slice(MAGIC);
        payload.extend_from_slice(plaintext);

        let ciphertext = cipher
            .encrypt(nonce, payload.as_slice())
            .map_err(|_| CryptoError::Encryption);
        payload.zeroize();
        let ciphertext = ciphertext?;

        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    /// Reverse of [`Cipher::seal`]. Fails on a wrong key or tampered data.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < NONCE_LEN + MAGIC.len() {
            return Err(CryptoError::InvalidFormat);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::Decryption)?;
        let nonce = Nonce::from_slice(nonce_bytes);

        let mut decrypted = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Decryption)?;

        if decrypted.len() < MAGIC.len() || &decrypted[..MAGIC.len()] != MAGIC {
            decrypted.zeroize();
            return Err(CryptoError::Decryption);
        }

        let plaintext = decrypted[MAGIC.len()..].to_vec();
        decrypted.zeroize();
        Ok(plaintext)
    }
}

/// Seals every value written to the inner medium with a passphrase-derived key.
pub struct EncryptedStore<S> {
    inner: S,
    cipher: Cipher,
}

impl<S: KeyValueStore> EncryptedStore<S> {
    /// Open over `inner`, creating the salt on first use. A wrong passphrase
    /// for an existing store fails here with [`CryptoError::Decryption`].
    pub fn open(inner: S, passphrase: &str, params: &KdfParams) -> Result<Self, StorageError> {
        let salt = match inner.get(SALT_KEY)? {
            Some(salt) if salt.len() == SALT_LEN => salt,
            Some(_) => return Err(CryptoError::InvalidFormat.into()),
            None => {
                let mut salt = vec![0u8; SALT_LEN];
                rand::thread_rng().fill_bytes(&mut salt);
                inner.set(SALT_KEY, &salt)?;
                salt
            }
        };

        let cipher = Cipher::derive(passphrase, &salt, params)?;
        match inner.get(CHECK_KEY)? {
            Some(check) => {
                cipher.open(&check)?;
            }
            None => inner.set(CHECK_KEY, &cipher.seal(MAGIC)?)?,
        }

        Ok(Self { inner, cipher })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: KeyValueStore> KeyValueStore for EncryptedStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.inner.get(key)? {
            Some(sealed) => Ok(Some(self.cipher.open(&sealed)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let sealed = self.cipher.seal(value)?;
        self.inner.set(key, &sealed)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}
