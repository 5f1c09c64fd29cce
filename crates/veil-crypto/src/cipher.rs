//! AES-256-GCM envelope encryption.
//!
//! Every call to [`encrypt`] draws a fresh 12-byte nonce from the OS CSPRNG.
//! The 16-byte authentication tag is appended to the ciphertext.
//!
//! **Wire format** (JSON):
//! ```text
//! { "iv": [12 numbers], "cipherText": [numbers] }
//! ```
//!
//! **Compact format** (hex):
//! ```text
//! hex(iv (12 bytes) | cipherText+tag (variable length))
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::{rngs::OsRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::agreement::SharedSecret;
use crate::error::{CryptoError, Result};

/// Nonce length in bytes.
pub const IV_LEN: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// One encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    #[serde(deserialize_with = "deserialize_iv")]
    pub iv: Vec<u8>,
    pub cipher_text: Vec<u8>,
}

fn deserialize_iv<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let iv = Vec::<u8>::deserialize(deserializer)?;
    if iv.len() != IV_LEN {
        return Err(de::Error::invalid_length(iv.len(), &"a 12-byte iv"));
    }
    Ok(iv)
}

impl EncryptedEnvelope {
    /// Parse the JSON wire form. Missing fields or a wrong-length iv are
    /// decoding errors; no decryption is attempted.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(CryptoError::decoding)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(CryptoError::decoding)
    }

    /// Parse the compact `hex(iv || cipherText)` form.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str).map_err(CryptoError::decoding)?;
        if bytes.len() < IV_LEN {
            return Err(CryptoError::Decoding(format!(
                "envelope too short: expected at least {} bytes, got {}",
                IV_LEN,
                bytes.len()
            )));
        }

        let (iv, cipher_text) = bytes.split_at(IV_LEN);
        Ok(Self {
            iv: iv.to_vec(),
            cipher_text: cipher_text.to_vec(),
        })
    }

    pub fn to_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(self.iv.len() + self.cipher_text.len());
        bytes.extend_from_slice(&self.iv);
        bytes.extend_from_slice(&self.cipher_text);
        hex::encode(bytes)
    }
}

fn cipher_for(secret: &SharedSecret) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(secret.as_bytes()))
}

/// Encrypt `plaintext` under `secret` with a fresh random nonce.
pub fn encrypt(secret: &SharedSecret, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher_text = cipher_for(secret)
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedEnvelope {
        iv: iv.to_vec(),
        cipher_text,
    })
}

/// Decrypt and authenticate an envelope.
///
/// Any failure (wrong key, wrong nonce, tampering, malformed lengths) is
/// reported as [`CryptoError::Decryption`].
pub fn decrypt(secret: &SharedSecret, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
    if envelope.iv.len() != IV_LEN || envelope.cipher_text.len() < TAG_LEN {
        return Err(CryptoError::Decryption);
    }

    cipher_for(secret)
        .decrypt(
            Nonce::from_slice(&envelope.iv),
            envelope.cipher_text.as_slice(),
        )
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret(fill: u8) -> SharedSecret {
        SharedSecret::from_bytes([fill; 32])
    }

    #[test]
    fn test_encrypt_decrypt() {
        let secret = test_secret(7);
        let envelope = encrypt(&secret, b"hello world").unwrap();

        assert_eq!(envelope.iv.len(), IV_LEN);
        assert_eq!(envelope.cipher_text.len(), b"hello world".len() + TAG_LEN);
        assert_eq!(decrypt(&secret, &envelope).unwrap(), b"hello world");
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let secret = test_secret(7);
        let first = encrypt(&secret, b"same").unwrap();
        let second = encrypt(&secret, b"same").unwrap();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.cipher_text, second.cipher_text);
    }

    #[test]
    fn test_wrong_key() {
        let envelope = encrypt(&test_secret(1), b"secret").unwrap();
        assert_eq!(
            decrypt(&test_secret(2), &envelope),
            Err(CryptoError::Decryption)
        );
    }

    #[test]
    fn test_tampering_detected_on_every_byte() {
        let secret = test_secret(9);
        let envelope = encrypt(&secret, b"transfer 10 tokens").unwrap();

        for i in 0..envelope.cipher_text.len() {
            let mut tampered = envelope.clone();
            tampered.cipher_text[i] ^= 0x01;
            assert_eq!(decrypt(&secret, &tampered), Err(CryptoError::Decryption));
        }
        for i in 0..envelope.iv.len() {
            let mut tampered = envelope.clone();
            tampered.iv[i] ^= 0x80;
            assert_eq!(decrypt(&secret, &tampered), Err(CryptoError::Decryption));
        }
    }

    #[test]
    fn test_malformed_envelope() {
        let secret = test_secret(3);
        let envelope = EncryptedEnvelope {
            iv: vec![1, 2, 3],
            cipher_text: vec![4, 5, 6],
        };
        assert_eq!(decrypt(&secret, &envelope), Err(CryptoError::Decryption));

        let short = EncryptedEnvelope {
            iv: vec![0; IV_LEN],
            cipher_text: vec![4, 5, 6],
        };
        assert_eq!(decrypt(&secret, &short), Err(CryptoError::Decryption));
    }

    #[test]
    fn test_json_wire_shape() {
        let secret = test_secret(4);
        let envelope = encrypt(&secret, b"{}").unwrap();
        let json = envelope.to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["iv"].as_array().unwrap().len(), IV_LEN);
        assert!(value["cipherText"].is_array());

        let parsed = EncryptedEnvelope::from_json(&json).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_json_wrong_iv_is_decoding_error() {
        let err = EncryptedEnvelope::from_json(r#"{"iv":[1,2,3],"cipherText":[4,5,6]}"#)
            .unwrap_err();
        assert!(matches!(err, CryptoError::Decoding(_)));

        let err = EncryptedEnvelope::from_json(r#"{"cipherText":[4,5,6]}"#).unwrap_err();
        assert!(matches!(err, CryptoError::Decoding(_)));
    }

    #[test]
    fn test_hex_form() {
        let secret = test_secret(5);
        let envelope = encrypt(&secret, b"compact").unwrap();
        let hex = envelope.to_hex();
        assert!(hex.starts_with(&hex::encode(&envelope.iv)));

        let parsed = EncryptedEnvelope::from_hex(&hex).unwrap();
        assert_eq!(decrypt(&secret, &parsed).unwrap(), b"compact");

        assert!(matches!(
            EncryptedEnvelope::from_hex("0102"),
            Err(CryptoError::Decoding(_))
        ));
    }
}
