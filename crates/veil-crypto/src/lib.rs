//! Cryptographic envelope for Veil.
//!
//! This crate provides:
//! - P-256 key pairs with SPKI / PKCS#8 hex containers
//! - ECDH key agreement producing a 256-bit shared secret
//! - AES-256-GCM content encryption with fresh random nonces
//! - Compressed JSON encoding of RPC requests and responses
//!
//! # Design
//!
//! The relay never sees plaintext. Both peers derive the same secret from
//! their own private key and the other side's public key, then exchange
//! [`EncryptedEnvelope`]s:
//!
//! ```text
//! payload -> serde_json -> zlib -> AES-256-GCM(secret, random iv) -> { iv, cipherText }
//! ```
//!
//! Key containers are hex-encoded DER so that any standards-compliant
//! implementation of the same primitives can import them.

#![forbid(unsafe_code)]

pub mod agreement;
pub mod cipher;
pub mod content;
pub mod der;
pub mod error;
pub mod keys;

pub use agreement::{derive_shared_secret, generate_key_pair, KeyPair, SharedSecret};
pub use cipher::{decrypt, encrypt, EncryptedEnvelope};
pub use content::{
    decrypt_content, encrypt_content, RpcAction, RpcError, RpcFailure, RpcRequest, RpcResponse,
    RpcResult, SessionCipher,
};
pub use error::{CryptoError, Result};
pub use keys::{
    export_key_to_hex_string, import_key_from_hex_string, Key, KeyKind, PrivateKey, PublicKey,
};
