use thiserror::Error;

#[derive(Error, Debug)]
pub enum CipherError {
    /// The pre-shared seed must provide at least 32 bytes of key material.
    #[error("Key material too short: need 32 bytes, got {0}")]
    KeyTooShort(usize),

    /// Wrong key, corrupted ciphertext, and mismatched IV all land here;
    /// the causes are deliberately indistinguishable to the caller.
    #[error("Decryption failed: invalid ciphertext, IV, or wrong key")]
    DecryptFailed,
}

/// A blood-type code outside the eight recognized ABO/Rh values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown blood type: {0}")]
pub struct UnknownBloodType(pub String);
