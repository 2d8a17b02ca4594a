//! AES-256-CBC cipher for donor passwords.
//!
//! Both the submitting client and the verifying server derive the same key
//! from one pre-shared seed, so the server can decrypt a stored secret and a
//! submitted secret and compare the plaintexts. This decrypt-then-compare
//! scheme is part of the stored-data format and is reproduced as-is: CBC has
//! no authentication tag, so ciphertexts are malleable, and the scheme is
//! weaker than a salted password hash. Changing it would change the sheet
//! format and is out of scope here.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore;

use crate::error::CipherError;
use crate::record::EncryptedSecret;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub const KEY_SIZE: usize = 32;
pub const IV_SIZE: usize = 16;

/// AES-256 key derived from the pre-shared seed. Derived once at startup
/// and immutable for the process lifetime.
#[derive(Clone)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Derive a key from a seed string: UTF-8 encode and take exactly the
    /// first 32 bytes. Deterministic, so client and server derive identical
    /// keys from the same seed.
    pub fn derive(seed: &str) -> Result<Self, CipherError> {
        let bytes = seed.as_bytes();
        if bytes.len() < KEY_SIZE {
            return Err(CipherError::KeyTooShort(bytes.len()));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes[..KEY_SIZE]);
        Ok(Self(key))
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.write_str("SecretKey(..)")
    }
}

/// Encrypt a password with a fresh random 16-byte IV. The IV is never
/// reused across calls.
pub fn encrypt(plaintext: &str, key: &SecretKey) -> EncryptedSecret {
    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let ciphertext = Aes256CbcEnc::new(&key.0.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    EncryptedSecret {
        ciphertext: BASE64.encode(ciphertext),
        iv: BASE64.encode(iv),
    }
}

/// Decrypt an [`EncryptedSecret`] back to the password. Every failure mode
/// (bad base64, wrong IV length, padding error from a wrong key or corrupted
/// input, non-UTF-8 plaintext) collapses into [`CipherError::DecryptFailed`].
pub fn decrypt(secret: &EncryptedSecret, key: &SecretKey) -> Result<String, CipherError> {
    let ciphertext = BASE64
        .decode(&secret.ciphertext)
        .map_err(|_| CipherError::DecryptFailed)?;
    let iv: [u8; IV_SIZE] = BASE64
        .decode(&secret.iv)
        .map_err(|_| CipherError::DecryptFailed)?
        .try_into()
        .map_err(|_| CipherError::DecryptFailed)?;

    let plaintext = Aes256CbcDec::new(&key.0.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CipherError::DecryptFailed)?;

    String::from_utf8(plaintext).map_err(|_| CipherError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SecretKey {
        SecretKey::derive("0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        for plaintext in ["hunter2", "", "senha com espaços e acentuação", "x"] {
            let encrypted = encrypt(plaintext, &key);
            assert_eq!(decrypt(&encrypted, &key).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let key = test_key();
        let a = encrypt("hunter2", &key);
        let b = encrypt("hunter2", &key);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrong_key_never_yields_plaintext() {
        let key = test_key();
        let wrong = SecretKey::derive("ffffffffffffffffffffffffffffffff").unwrap();
        let encrypted = encrypt("hunter2", &key);
        // Either a padding failure or a different plaintext; never the original.
        assert_ne!(decrypt(&encrypted, &wrong).ok().as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_corrupted_ciphertext_fails() {
        let key = test_key();
        let mut encrypted = encrypt("hunter2", &key);
        encrypted.ciphertext = "not base64 at all!".to_string();
        assert!(matches!(
            decrypt(&encrypted, &key),
            Err(CipherError::DecryptFailed)
        ));
    }

    #[test]
    fn test_wrong_iv_length_fails() {
        let key = test_key();
        let mut encrypted = encrypt("hunter2", &key);
        encrypted.iv = BASE64.encode([0u8; 8]);
        assert!(matches!(
            decrypt(&encrypted, &key),
            Err(CipherError::DecryptFailed)
        ));
    }

    #[test]
    fn test_unaligned_ciphertext_fails() {
        let key = test_key();
        let encrypted = EncryptedSecret {
            ciphertext: BASE64.encode([1u8, 2, 3]),
            iv: BASE64.encode([0u8; IV_SIZE]),
        };
        assert!(decrypt(&encrypted, &key).is_err());
    }

    #[test]
    fn test_derive_is_deterministic_over_first_32_bytes() {
        let a = SecretKey::derive("0123456789abcdef0123456789abcdefTRAILING").unwrap();
        let b = SecretKey::derive("0123456789abcdef0123456789abcdef").unwrap();
        let encrypted = encrypt("hunter2", &a);
        assert_eq!(decrypt(&encrypted, &b).unwrap(), "hunter2");
    }

    #[test]
    fn test_derive_rejects_short_seed() {
        assert!(matches!(
            SecretKey::derive("too short"),
            Err(CipherError::KeyTooShort(9))
        ));
    }
}
