use crate::{Error, Result, Salt};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};
use sha2::Sha256;
use zeroize::Zeroize;

pub const ALGORITHM: &str = "ChaCha20-Poly1305";
pub const KDF_ITERATIONS: u32 = 100_000;
pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Password-keyed AEAD for object payloads.
///
/// The key is derived with PBKDF2-HMAC-SHA256 over the salt; the same
/// password and salt always yield the same key, so the salt recorded in a
/// version manifest is enough to decrypt that version again.
pub struct Crypter {
    cipher: ChaCha20Poly1305,
    salt: Salt,
}

impl Crypter {
    /// Builds a crypter, generating a fresh salt when none is given.
    pub fn new(password: &str, salt: Option<Salt>) -> Self {
        let salt = salt.unwrap_or_else(Salt::generate);

        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), KDF_ITERATIONS, &mut key);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        key.zeroize();

        Self { cipher, salt }
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn algorithm(&self) -> &'static str {
        ALGORITHM
    }

    /// Returns `nonce || ciphertext || tag` with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Fails with [`Error::AuthenticationFailed`] when the tag does not verify.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(Error::AuthenticationFailed {
                path: format!("<{} byte blob>", blob.len()),
            });
        }

        let (nonce_bytes, encrypted) = blob.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
            .map_err(|_| Error::AuthenticationFailed {
                path: format!("<{} byte blob>", blob.len()),
            })
    }
}
