//! Fixed-layout DER containers for P-256 keys.
//!
//! Both containers have a constant shape on P-256, so encoding is a copy into
//! known offsets and decoding is a length + prefix check followed by slicing.
//!
//! Public key (`SubjectPublicKeyInfo`, 91 bytes):
//!
//! ```text
//! 30 59                                  SEQUENCE
//!    30 13                               SEQUENCE (AlgorithmIdentifier)
//!       06 07 2a 86 48 ce 3d 02 01       OID id-ecPublicKey
//!       06 08 2a 86 48 ce 3d 03 01 07    OID prime256v1
//!    03 42 00                            BIT STRING, 0 unused bits
//!       04 || X || Y                     uncompressed point (65 bytes)
//! ```
//!
//! Private key (`PrivateKeyInfo` wrapping SEC1 `ECPrivateKey`, 138 bytes):
//!
//! ```text
//! 30 81 87                               SEQUENCE
//!    02 01 00                            INTEGER version 0
//!    30 13 ...                           AlgorithmIdentifier (as above)
//!    04 6d                               OCTET STRING
//!       30 6b                            SEQUENCE (ECPrivateKey)
//!          02 01 01                      INTEGER version 1
//!          04 20 || d                    OCTET STRING scalar (32 bytes)
//!          a1 44                         [1] publicKey
//!             03 42 00 || 04 || X || Y   BIT STRING point (65 bytes)
//! ```

use thiserror::Error;

/// Raw uncompressed SEC1 point length.
pub const POINT_LEN: usize = 65;

/// Raw scalar length.
pub const SCALAR_LEN: usize = 32;

/// SPKI header preceding the raw point.
pub const SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a,
    0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

/// Total SPKI container length.
pub const SPKI_LEN: usize = SPKI_PREFIX.len() + POINT_LEN;

/// PKCS#8 header preceding the raw scalar.
pub const PKCS8_PREFIX: [u8; 36] = [
    0x30, 0x81, 0x87, 0x02, 0x01, 0x00, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02,
    0x01, 0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x04, 0x6d, 0x30, 0x6b, 0x02,
    0x01, 0x01, 0x04, 0x20,
];

/// Tag and header between the scalar and the embedded public point.
pub const PKCS8_PUBLIC_TAG: [u8; 5] = [0xa1, 0x44, 0x03, 0x42, 0x00];

/// Byte offset of the scalar inside the PKCS#8 container.
pub const PKCS8_SCALAR_OFFSET: usize = PKCS8_PREFIX.len();

/// Byte offset of the public tag inside the PKCS#8 container.
pub const PKCS8_PUBLIC_TAG_OFFSET: usize = PKCS8_SCALAR_OFFSET + SCALAR_LEN;

/// Byte offset of the embedded point inside the PKCS#8 container.
pub const PKCS8_POINT_OFFSET: usize = PKCS8_PUBLIC_TAG_OFFSET + PKCS8_PUBLIC_TAG.len();

/// Total PKCS#8 container length.
pub const PKCS8_LEN: usize = PKCS8_POINT_OFFSET + POINT_LEN;

/// Structural container errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DerError {
    #[error("invalid container length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("unexpected container header")]
    Header,
}

/// Decoded PKCS#8 key material.
pub struct Pkcs8Parts<'a> {
    pub scalar: &'a [u8; SCALAR_LEN],
    pub point: &'a [u8; POINT_LEN],
}

/// Wrap a raw point in an SPKI container.
pub fn encode_spki(point: &[u8; POINT_LEN]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SPKI_LEN);
    out.extend_from_slice(&SPKI_PREFIX);
    out.extend_from_slice(point);
    out
}

/// Extract the raw point from an SPKI container.
pub fn decode_spki(der: &[u8]) -> Result<&[u8; POINT_LEN], DerError> {
    check_len(der, SPKI_LEN)?;
    if der[..SPKI_PREFIX.len()] != SPKI_PREFIX {
        return Err(DerError::Header);
    }
    fixed(&der[SPKI_PREFIX.len()..])
}

/// Wrap a raw scalar and its public point in a PKCS#8 container.
pub fn encode_pkcs8(scalar: &[u8; SCALAR_LEN], point: &[u8; POINT_LEN]) -> Vec<u8> {
    let mut out = Vec::with_capacity(PKCS8_LEN);
    out.extend_from_slice(&PKCS8_PREFIX);
    out.extend_from_slice(scalar);
    out.extend_from_slice(&PKCS8_PUBLIC_TAG);
    out.extend_from_slice(point);
    out
}

/// Extract the scalar and embedded point from a PKCS#8 container.
pub fn decode_pkcs8(der: &[u8]) -> Result<Pkcs8Parts<'_>, DerError> {
    check_len(der, PKCS8_LEN)?;
    if der[..PKCS8_SCALAR_OFFSET] != PKCS8_PREFIX
        || der[PKCS8_PUBLIC_TAG_OFFSET..PKCS8_POINT_OFFSET] != PKCS8_PUBLIC_TAG
    {
        return Err(DerError::Header);
    }

    Ok(Pkcs8Parts {
        scalar: fixed(&der[PKCS8_SCALAR_OFFSET..PKCS8_PUBLIC_TAG_OFFSET])?,
        point: fixed(&der[PKCS8_POINT_OFFSET..])?,
    })
}

fn check_len(der: &[u8], expected: usize) -> Result<(), DerError> {
    if der.len() != expected {
        return Err(DerError::Length {
            expected,
            actual: der.len(),
        });
    }
    Ok(())
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<&[u8; N], DerError> {
    bytes.try_into().map_err(|_| DerError::Length {
        expected: N,
        actual: bytes.len(),
    })
}
