//! P-256 keys and their hex container encoding.
//!
//! Public keys travel as hex-encoded SPKI, private keys as hex-encoded
//! PKCS#8. Both containers are built from fixed offset tables in [`crate::der`].
//!
//! # Example
//!
//! ```
//! use veil_crypto::keys::{export_public_key_hex, import_public_key_hex};
//! use veil_crypto::generate_key_pair;
//!
//! let pair = generate_key_pair();
//! let hex = export_public_key_hex(&pair.public_key);
//! assert!(hex.starts_with("3059301306072a8648ce3d0201"));
//!
//! let restored = import_public_key_hex(&hex).unwrap();
//! assert_eq!(restored, pair.public_key);
//! ```

use p256::elliptic_curve::sec1::ToEncodedPoint;
use std::fmt;
use zeroize::Zeroizing;

use crate::der::{self, POINT_LEN, SCALAR_LEN};
use crate::error::{CryptoError, Result};

/// SEC1 marker for an uncompressed point.
const UNCOMPRESSED_MARKER: u8 = 0x04;

/// Which container a hex string holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Public,
    Private,
}

/// A key of either kind, as produced by [`import_key_from_hex_string`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Public(PublicKey),
    Private(PrivateKey),
}

impl Key {
    pub fn kind(&self) -> KeyKind {
        match self {
            Key::Public(_) => KeyKind::Public,
            Key::Private(_) => KeyKind::Private,
        }
    }
}

/// P-256 public key. Always a valid, non-identity point.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(p256::PublicKey);

impl PublicKey {
    /// Parse a raw 65-byte uncompressed point.
    pub fn from_raw(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != POINT_LEN || bytes[0] != UNCOMPRESSED_MARKER {
            return Err(CryptoError::invalid_public_key());
        }
        p256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::invalid_public_key())
    }

    /// Raw uncompressed point: `0x04 || X || Y`.
    pub fn to_raw(&self) -> [u8; POINT_LEN] {
        let mut out = [0u8; POINT_LEN];
        out.copy_from_slice(self.0.to_encoded_point(false).as_bytes());
        out
    }

    pub(crate) fn inner(&self) -> &p256::PublicKey {
        &self.0
    }
}

impl From<p256::PublicKey> for PublicKey {
    fn from(key: p256::PublicKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_raw()))
    }
}

/// P-256 private key. The scalar is zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(p256::SecretKey);

impl PrivateKey {
    /// Parse a raw 32-byte scalar.
    pub fn from_raw(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SCALAR_LEN {
            return Err(CryptoError::invalid_private_key());
        }
        p256::SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::invalid_private_key())
    }

    /// Raw 32-byte scalar.
    ///
    /// # Security
    /// Handle with care! These bytes can recreate the key.
    pub fn to_raw(&self) -> [u8; SCALAR_LEN] {
        let mut out = [0u8; SCALAR_LEN];
        out.copy_from_slice(&self.0.to_bytes());
        out
    }

    /// The public key belonging to this scalar.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub(crate) fn inner(&self) -> &p256::SecretKey {
        &self.0
    }
}

impl From<p256::SecretKey> for PrivateKey {
    fn from(key: p256::SecretKey) -> Self {
        Self(key)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Export a public key as hex-encoded SPKI.
pub fn export_public_key_hex(key: &PublicKey) -> String {
    hex::encode(der::encode_spki(&key.to_raw()))
}

/// Export a private key as hex-encoded PKCS#8, embedding its public point.
pub fn export_private_key_hex(key: &PrivateKey) -> String {
    let scalar = Zeroizing::new(key.to_raw());
    let container = Zeroizing::new(der::encode_pkcs8(&scalar, &key.public_key().to_raw()));
    hex::encode(container.as_slice())
}

/// Import a public key from hex-encoded SPKI.
pub fn import_public_key_hex(hex_str: &str) -> Result<PublicKey> {
    let bytes = hex::decode(hex_str).map_err(|_| CryptoError::invalid_public_key())?;
    let point = der::decode_spki(&bytes).map_err(|_| CryptoError::invalid_public_key())?;
    PublicKey::from_raw(point)
}

/// Import a private key from hex-encoded PKCS#8.
///
/// The embedded public point must match the scalar.
pub fn import_private_key_hex(hex_str: &str) -> Result<PrivateKey> {
    let bytes =
        Zeroizing::new(hex::decode(hex_str).map_err(|_| CryptoError::invalid_private_key())?);
    let parts = der::decode_pkcs8(&bytes).map_err(|_| CryptoError::invalid_private_key())?;
    let key = PrivateKey::from_raw(parts.scalar)?;

    if key.public_key().to_raw() != *parts.point {
        return Err(CryptoError::invalid_private_key());
    }

    Ok(key)
}

/// Export either kind of key to its hex container.
pub fn export_key_to_hex_string(key: &Key) -> String {
    match key {
        Key::Public(key) => export_public_key_hex(key),
        Key::Private(key) => export_private_key_hex(key),
    }
}

/// Import a hex container as the requested kind of key.
///
/// Supplying a public container with [`KeyKind::Private`] (or vice versa)
/// fails with [`CryptoError::InvalidKey`].
pub fn import_key_from_hex_string(kind: KeyKind, hex_str: &str) -> Result<Key> {
    match kind {
        KeyKind::Public => import_public_key_hex(hex_str).map(Key::Public),
        KeyKind::Private => import_private_key_hex(hex_str).map(Key::Private),
    }
}
