//! P-256 key pairs and ECDH key agreement.
//!
//! The shared secret is the X coordinate of `own_scalar * peer_point`, used
//! directly as the AES-256 key. Both peers arrive at the same 32 bytes.

use rand::rngs::OsRng;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Result;
use crate::keys::{PrivateKey, PublicKey};

/// Shared secret length in bytes.
pub const SHARED_SECRET_LEN: usize = 32;

/// P-256 key pair. Generated together, never individually.
#[derive(Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

impl KeyPair {
    /// Generate a new random key pair using the OS CSPRNG.
    pub fn generate() -> Self {
        let private_key = PrivateKey::from(p256::SecretKey::random(&mut OsRng));
        Self {
            public_key: private_key.public_key(),
            private_key,
        }
    }

    /// Rebuild a pair from its private key.
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        Self {
            public_key: private_key.public_key(),
            private_key,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// 256-bit symmetric key derived by ECDH.
///
/// Never serialized. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_LEN]);

impl SharedSecret {
    /// Wrap existing key material, e.g. a secret derived by another implementation.
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_LEN] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Generate a new random key pair.
pub fn generate_key_pair() -> KeyPair {
    KeyPair::generate()
}

/// Derive the shared secret from our private key and the peer's public key.
pub fn derive_shared_secret(own: &PrivateKey, peer: &PublicKey) -> SharedSecret {
    let shared =
        p256::ecdh::diffie_hellman(own.inner().to_nonzero_scalar(), peer.inner().as_affine());

    let mut secret = [0u8; SHARED_SECRET_LEN];
    secret.copy_from_slice(shared.raw_secret_bytes());
    SharedSecret(secret)
}

/// Derive the shared secret from a raw 65-byte peer point.
///
/// Fails with [`crate::CryptoError::InvalidKey`] if the point is malformed,
/// off the curve, or the identity.
pub fn derive_shared_secret_from_raw(own: &PrivateKey, peer_raw: &[u8]) -> Result<SharedSecret> {
    let peer = PublicKey::from_raw(peer_raw)?;
    Ok(derive_shared_secret(own, &peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CryptoError;

    #[test]
    fn test_key_pair_generation() {
        let pair = generate_key_pair();
        assert_eq!(pair.private_key.public_key(), pair.public_key);
        assert_eq!(pair.public_key.to_raw()[0], 0x04);

        let other = generate_key_pair();
        assert_ne!(pair.public_key, other.public_key);
    }

    #[test]
    fn test_shared_secret_symmetry() {
        for _ in 0..8 {
            let alice = generate_key_pair();
            let bob = generate_key_pair();

            let ab = derive_shared_secret(&alice.private_key, &bob.public_key);
            let ba = derive_shared_secret(&bob.private_key, &alice.public_key);
            assert_eq!(ab.as_bytes(), ba.as_bytes());
        }
    }

    #[test]
    fn test_different_peers_different_secrets() {
        let alice = generate_key_pair();
        let bob = generate_key_pair();
        let carol = generate_key_pair();

        let ab = derive_shared_secret(&alice.private_key, &bob.public_key);
        let ac = derive_shared_secret(&alice.private_key, &carol.public_key);
        assert_ne!(ab.as_bytes(), ac.as_bytes());
    }

    #[test]
    fn test_raw_peer_validation() {
        let alice = generate_key_pair();
        let bob = generate_key_pair();

        let secret =
            derive_shared_secret_from_raw(&alice.private_key, &bob.public_key.to_raw()).unwrap();
        let expected = derive_shared_secret(&alice.private_key, &bob.public_key);
        assert_eq!(secret.as_bytes(), expected.as_bytes());

        // Identity and off-curve points
        let identity = [0u8; 1];
        assert!(matches!(
            derive_shared_secret_from_raw(&alice.private_key, &identity),
            Err(CryptoError::InvalidKey(_))
        ));
        let mut off_curve = bob.public_key.to_raw();
        off_curve[10] ^= 0x55;
        assert!(matches!(
            derive_shared_secret_from_raw(&alice.private_key, &off_curve),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_from_private_key() {
        let pair = generate_key_pair();
        let rebuilt = KeyPair::from_private_key(pair.private_key.clone());
        assert_eq!(rebuilt.public_key, pair.public_key);
    }
}
