//! AES-GCM field-level encryption for message content at rest.
//!
//! The key length picks the cipher: 16, 24 or 32 bytes select AES-128/192/256.
//! A zero-length key disables encryption and makes the codec a pass-through.
//! Any other length is accepted at construction and rejected at use.
//!
//! Encrypted format: `base64(nonce (12 bytes) || ciphertext || tag)`
//!
//! SECURITY: Error types never contain plaintext or key material.

use aes::Aes192;
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chatvault_types::error::CryptoError;

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

type Aes192Gcm = AesGcm<Aes192, U12>;

enum Cipher {
    Disabled,
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
    /// Key of an unsupported length; every operation fails.
    Invalid(usize),
}

/// Reversible keyed transform for sensitive text fields.
///
/// Each encryption generates a fresh random nonce, so encrypting the same
/// plaintext twice produces different output.
pub struct EncryptionCodec {
    cipher: Cipher,
}

impl EncryptionCodec {
    pub fn new(key: &[u8]) -> Self {
        let cipher = match key.len() {
            0 => Cipher::Disabled,
            16 => Aes128Gcm::new_from_slice(key)
                .map(Cipher::Aes128)
                .unwrap_or(Cipher::Invalid(16)),
            24 => Aes192Gcm::new_from_slice(key)
                .map(Cipher::Aes192)
                .unwrap_or(Cipher::Invalid(24)),
            32 => Aes256Gcm::new_from_slice(key)
                .map(Cipher::Aes256)
                .unwrap_or(Cipher::Invalid(32)),
            other => Cipher::Invalid(other),
        };
        Self { cipher }
    }

    /// A pass-through codec.
    pub fn disabled() -> Self {
        Self {
            cipher: Cipher::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.cipher, Cipher::Disabled)
    }

    /// Encrypt `plaintext`, or return it unchanged when disabled.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let sealed = match &self.cipher {
            Cipher::Disabled => return Ok(plaintext.to_string()),
            Cipher::Invalid(len) => return Err(CryptoError::InvalidKeySize(*len)),
            Cipher::Aes128(cipher) => seal(cipher, plaintext.as_bytes())?,
            Cipher::Aes192(cipher) => seal(cipher, plaintext.as_bytes())?,
            Cipher::Aes256(cipher) => seal(cipher, plaintext.as_bytes())?,
        };
        Ok(STANDARD.encode(sealed))
    }

    /// Reverse [`encrypt`](Self::encrypt), or return the input unchanged when disabled.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        if let Cipher::Disabled = self.cipher {
            return Ok(encoded.to_string());
        }

        let data = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Base64Decode(e.to_string()))?;

        let plaintext = match &self.cipher {
            Cipher::Disabled => data,
            Cipher::Invalid(len) => return Err(CryptoError::CipherInit(*len)),
            Cipher::Aes128(cipher) => open(cipher, &data)?,
            Cipher::Aes192(cipher) => open(cipher, &data)?,
            Cipher::Aes256(cipher) => open(cipher, &data)?,
        };

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}

impl std::fmt::Debug for EncryptionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.cipher {
            Cipher::Disabled => "disabled",
            Cipher::Aes128(_) => "aes-128-gcm",
            Cipher::Aes192(_) => "aes-192-gcm",
            Cipher::Aes256(_) => "aes-256-gcm",
            Cipher::Invalid(_) => "invalid",
        };
        f.debug_struct("EncryptionCodec").field("mode", &mode).finish()
    }
}

/// Returns `nonce || ciphertext`.
fn seal<C>(cipher: &C, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: Aead + AeadCore<NonceSize = U12>,
{
    let nonce = C::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Expects `nonce || ciphertext`.
fn open<C>(cipher: &C, data: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: Aead + AeadCore<NonceSize = U12>,
{
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let nonce = GenericArray::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(len: usize) -> Vec<u8> {
        // Deterministic key for testing only
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_roundtrip_all_key_sizes() {
        for len in [16, 24, 32] {
            let codec = EncryptionCodec::new(&test_key(len));
            assert!(codec.is_enabled());

            let plaintext = "hello world, this is a private message";
            let encrypted = codec.encrypt(plaintext).unwrap();
            assert_ne!(encrypted, plaintext);
            assert_eq!(codec.decrypt(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_random_nonce_produces_different_ciphertexts() {
        let codec = EncryptionCodec::new(&test_key(32));
        let encrypted1 = codec.encrypt("same plaintext").unwrap();
        let encrypted2 = codec.encrypt("same plaintext").unwrap();

        // Ciphertexts should differ (different random nonces)
        assert_ne!(encrypted1, encrypted2);
        assert_eq!(codec.decrypt(&encrypted1).unwrap(), "same plaintext");
        assert_eq!(codec.decrypt(&encrypted2).unwrap(), "same plaintext");
    }

    #[test]
    fn test_invalid_key_sizes_rejected_on_encrypt() {
        for len in [1, 8, 15, 17, 31, 33, 64] {
            let codec = EncryptionCodec::new(&test_key(len));
            let err = codec.encrypt("data").unwrap_err();
            assert_eq!(err, CryptoError::InvalidKeySize(len));
            assert!(err.to_string().contains("invalid encryption key size"));
        }
    }

    #[test]
    fn test_invalid_key_size_on_decrypt() {
        let codec = EncryptionCodec::new(&test_key(10));
        let valid_b64 = STANDARD.encode([0u8; 40]);
        let err = codec.decrypt(&valid_b64).unwrap_err();
        assert!(err.to_string().contains("failed to create cipher"));
    }

    #[test]
    fn test_disabled_is_identity() {
        for codec in [EncryptionCodec::new(&[]), EncryptionCodec::disabled()] {
            assert!(!codec.is_enabled());
            assert_eq!(codec.encrypt("plain").unwrap(), "plain");
            assert_eq!(codec.decrypt("plain").unwrap(), "plain");
            assert_eq!(codec.decrypt("not base64 !!").unwrap(), "not base64 !!");
        }
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let codec1 = EncryptionCodec::new(&test_key(32));
        let mut wrong_key = test_key(32);
        wrong_key[0] = 0xFF; // Flip one byte
        let codec2 = EncryptionCodec::new(&wrong_key);

        let encrypted = codec1.encrypt("secret data").unwrap();
        assert_eq!(
            codec2.decrypt(&encrypted).unwrap_err(),
            CryptoError::DecryptionFailed
        );
    }

    #[test]
    fn test_corrupted_ciphertext_fails() {
        let codec = EncryptionCodec::new(&test_key(16));
        let encrypted = codec.encrypt("integrity matters").unwrap();
        let mut raw = STANDARD.decode(&encrypted).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = STANDARD.encode(raw);

        assert_eq!(
            codec.decrypt(&tampered).unwrap_err(),
            CryptoError::DecryptionFailed
        );
    }

    #[test]
    fn test_malformed_base64() {
        let codec = EncryptionCodec::new(&test_key(32));
        let err = codec.decrypt("%%% not base64 %%%").unwrap_err();
        assert!(matches!(err, CryptoError::Base64Decode(_)));
        assert!(err.to_string().starts_with("failed to decode base64"));
    }

    #[test]
    fn test_ciphertext_too_short() {
        let codec = EncryptionCodec::new(&test_key(32));
        let short = STANDARD.encode([0u8; 5]); // Less than 12-byte nonce
        assert_eq!(
            codec.decrypt(&short).unwrap_err(),
            CryptoError::CiphertextTooShort
        );
    }

    #[test]
    fn test_empty_plaintext() {
        let codec = EncryptionCodec::new(&test_key(32));
        let encrypted = codec.encrypt("").unwrap();
        assert!(!encrypted.is_empty());
        assert_eq!(codec.decrypt(&encrypted).unwrap(), "");
    }

    #[test]
    fn test_multibyte_text() {
        let codec = EncryptionCodec::new(&test_key(24));
        let plaintext = "こんにちは 👋 ñandú, Привет";
        let encrypted = codec.encrypt(plaintext).unwrap();
        assert_eq!(codec.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn test_megabyte_payload() {
        let codec = EncryptionCodec::new(&test_key(32));
        let plaintext = "abcdefghij".repeat(110_000);
        let encrypted = codec.encrypt(&plaintext).unwrap();
        assert_eq!(codec.decrypt(&encrypted).unwrap(), plaintext);
    }

    #[test]
    fn test_debug_never_shows_key() {
        let codec = EncryptionCodec::new(&[0xAB; 32]);
        let debug = format!("{codec:?}");
        assert!(debug.contains("aes-256-gcm"));
        assert!(!debug.contains("171"));
        assert!(!debug.to_lowercase().contains("ab, ab"));
    }
}
