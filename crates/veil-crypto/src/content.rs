//! Content encoding for RPC payloads.
//!
//! Payloads are serialized to JSON, zlib-compressed, then encrypted.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::agreement::{derive_shared_secret, SharedSecret};
use crate::cipher::{self, EncryptedEnvelope};
use crate::error::{CryptoError, Result};
use crate::keys::{import_private_key_hex, import_public_key_hex, PrivateKey, PublicKey};

/// Upper bound on inflated plaintext.
const MAX_INFLATED_BYTES: u64 = 16 * 1024 * 1024;

/// RPC method invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcAction {
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Request sent from the application to the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest {
    pub action: RpcAction,
    pub chain_id: u64,
}

/// Error carried inside a response.
///
/// Objects with keys beyond `code`, `message` and `data` are not errors and
/// decode as [`RpcResult::Value`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// `{ "error": { .. } }` with no other keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcFailure {
    pub error: RpcError,
}

/// Response outcome: either an error object or an arbitrary success value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcResult {
    Error(RpcFailure),
    Value(serde_json::Value),
}

/// Response sent from the wallet to the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub result: RpcResult,
}

impl RpcResponse {
    pub fn success(value: serde_json::Value) -> Self {
        Self {
            result: RpcResult::Value(value),
        }
    }

    pub fn error(code: i64, message: impl Into<String>) -> Self {
        Self::error_with_data(code, message, None)
    }

    pub fn error_with_data(
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            result: RpcResult::Error(RpcFailure {
                error: RpcError {
                    code,
                    message: message.into(),
                    data,
                },
            }),
        }
    }
}

fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| CryptoError::Encryption(format!("compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| CryptoError::Encryption(format!("compression failed: {}", e)))
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(bytes)
        .take(MAX_INFLATED_BYTES + 1)
        .read_to_end(&mut inflated)
        .map_err(CryptoError::decoding)?;

    if inflated.len() as u64 > MAX_INFLATED_BYTES {
        return Err(CryptoError::Decoding(format!(
            "inflated payload exceeds {} bytes",
            MAX_INFLATED_BYTES
        )));
    }
    Ok(inflated)
}

/// Serialize, compress and encrypt a payload.
pub fn encrypt_content<T: Serialize>(
    payload: &T,
    secret: &SharedSecret,
) -> Result<EncryptedEnvelope> {
    let json = serde_json::to_vec(payload)
        .map_err(|e| CryptoError::Encryption(format!("serialization failed: {}", e)))?;
    let compressed = compress(&json)?;
    cipher::encrypt(secret, &compressed)
}

/// Decrypt, decompress and deserialize a payload.
///
/// Authentication failures are [`CryptoError::Decryption`]; authentic bytes
/// that do not inflate or parse are [`CryptoError::Decoding`].
pub fn decrypt_content<T: DeserializeOwned>(
    envelope: &EncryptedEnvelope,
    secret: &SharedSecret,
) -> Result<T> {
    let compressed = cipher::decrypt(secret, envelope)?;
    let json = decompress(&compressed)?;
    serde_json::from_slice(&json).map_err(CryptoError::decoding)
}

/// Per-session crypto context.
///
/// Holds the shared secret for the lifetime of a session.
pub struct SessionCipher {
    secret: SharedSecret,
}

impl SessionCipher {
    /// Derive the session secret from our private key and the peer's public key.
    pub fn new(own: &PrivateKey, peer: &PublicKey) -> Self {
        Self {
            secret: derive_shared_secret(own, peer),
        }
    }

    /// Build from hex containers (PKCS#8 for ours, SPKI for the peer's).
    pub fn from_hex(own_private_hex: &str, peer_public_hex: &str) -> Result<Self> {
        let own = import_private_key_hex(own_private_hex)?;
        let peer = import_public_key_hex(peer_public_hex)?;
        Ok(Self::new(&own, &peer))
    }

    pub fn from_secret(secret: SharedSecret) -> Self {
        Self { secret }
    }

    pub fn secret(&self) -> &SharedSecret {
        &self.secret
    }

    pub fn encrypt_content<T: Serialize>(&self, payload: &T) -> Result<EncryptedEnvelope> {
        encrypt_content(payload, &self.secret)
    }

    pub fn decrypt_content<T: DeserializeOwned>(&self, envelope: &EncryptedEnvelope) -> Result<T> {
        decrypt_content(envelope, &self.secret)
    }

    pub fn encrypt_request(&self, request: &RpcRequest) -> Result<EncryptedEnvelope> {
        self.encrypt_content(request)
    }

    pub fn decrypt_request(&self, envelope: &EncryptedEnvelope) -> Result<RpcRequest> {
        self.decrypt_content(envelope)
    }

    pub fn encrypt_response(&self, response: &RpcResponse) -> Result<EncryptedEnvelope> {
        self.encrypt_content(response)
    }

    pub fn decrypt_response(&self, envelope: &EncryptedEnvelope) -> Result<RpcResponse> {
        self.decrypt_content(envelope)
    }
}
