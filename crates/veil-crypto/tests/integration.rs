//! Interoperability tests against the reference `p256` encoders.

use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use serde_json::json;

use veil_crypto::keys::{
    export_private_key_hex, export_public_key_hex, import_private_key_hex, import_public_key_hex,
};
use veil_crypto::{
    decrypt, decrypt_content, derive_shared_secret, encrypt, encrypt_content, generate_key_pair,
    import_key_from_hex_string, CryptoError, EncryptedEnvelope, KeyKind, RpcAction, RpcRequest,
    RpcResponse, SessionCipher, SharedSecret,
};

const SPKI_HEX_PREFIX: &str = "3059301306072a8648ce3d020106082a8648ce3d030107034200";

fn reference_public(key: &veil_crypto::PublicKey) -> p256::PublicKey {
    p256::PublicKey::from_sec1_bytes(&key.to_raw()).unwrap()
}

fn reference_secret(key: &veil_crypto::PrivateKey) -> p256::SecretKey {
    p256::SecretKey::from_slice(&key.to_raw()).unwrap()
}

/// SPKI export must match the reference encoder byte for byte.
#[test]
fn test_public_export_matches_reference() {
    for _ in 0..8 {
        let pair = generate_key_pair();
        let ours = export_public_key_hex(&pair.public_key);
        let reference = reference_public(&pair.public_key)
            .to_public_key_der()
            .unwrap();

        assert!(ours.starts_with(SPKI_HEX_PREFIX));
        assert_eq!(ours, hex::encode(reference.as_bytes()));
    }
}

/// PKCS#8 export must match the reference encoder and import its output.
#[test]
fn test_private_export_matches_reference() {
    let pair = generate_key_pair();
    let ours = export_private_key_hex(&pair.private_key);
    let reference = reference_secret(&pair.private_key).to_pkcs8_der().unwrap();
    assert_eq!(ours, hex::encode(reference.as_bytes()));

    let parsed = p256::SecretKey::from_pkcs8_der(&hex::decode(&ours).unwrap()).unwrap();
    assert_eq!(parsed.to_bytes().as_slice(), pair.private_key.to_raw());

    let imported = import_private_key_hex(&hex::encode(reference.as_bytes())).unwrap();
    assert_eq!(imported, pair.private_key);
}

#[test]
fn test_roundtrip_both_kinds() {
    for _ in 0..8 {
        let pair = generate_key_pair();

        let public = import_public_key_hex(&export_public_key_hex(&pair.public_key)).unwrap();
        assert_eq!(public, pair.public_key);

        let private = import_private_key_hex(&export_private_key_hex(&pair.private_key)).unwrap();
        assert_eq!(private, pair.private_key);
    }
}

#[test]
fn test_public_container_imported_as_private() {
    let pair = generate_key_pair();
    let hex = export_public_key_hex(&pair.public_key);

    match import_key_from_hex_string(KeyKind::Private, &hex) {
        Err(CryptoError::InvalidKey(message)) => assert_eq!(message, "Invalid private key"),
        other => panic!("expected InvalidKey, got {:?}", other),
    }
}

/// Our ECDH must agree with the reference implementation on both sides.
#[test]
fn test_shared_secret_matches_reference() {
    let alice = generate_key_pair();
    let bob = generate_key_pair();

    let ours = derive_shared_secret(&alice.private_key, &bob.public_key);
    let reference = p256::ecdh::diffie_hellman(
        reference_secret(&bob.private_key).to_nonzero_scalar(),
        reference_public(&alice.public_key).as_affine(),
    );

    assert_eq!(ours.as_bytes().as_slice(), reference.raw_secret_bytes().as_slice());
}

#[test]
fn test_cross_peer_hello_world() {
    let wallet = generate_key_pair();
    let app = generate_key_pair();

    let app_secret = derive_shared_secret(&app.private_key, &wallet.public_key);
    let wallet_secret = derive_shared_secret(&wallet.private_key, &app.public_key);

    let envelope = encrypt_content(&"hello world", &app_secret).unwrap();
    let decoded: String = decrypt_content(&envelope, &wallet_secret).unwrap();
    assert_eq!(decoded, "hello world");

    let envelope = encrypt(&wallet_secret, b"hello world").unwrap();
    assert_eq!(decrypt(&app_secret, &envelope).unwrap(), b"hello world");
}

#[test]
fn test_malformed_envelope_always_rejected() {
    let pair = generate_key_pair();
    let peer = generate_key_pair();
    let secret = derive_shared_secret(&pair.private_key, &peer.public_key);

    let envelope = EncryptedEnvelope {
        iv: vec![1, 2, 3],
        cipher_text: vec![4, 5, 6],
    };
    assert_eq!(decrypt(&secret, &envelope), Err(CryptoError::Decryption));
    assert_eq!(
        decrypt_content::<serde_json::Value>(&envelope, &secret),
        Err(CryptoError::Decryption)
    );

    let parsed = EncryptedEnvelope::from_json(r#"{"iv":[1,2,3],"cipherText":[4,5,6]}"#);
    assert!(matches!(parsed, Err(CryptoError::Decoding(_))));
}

#[test]
fn test_tampered_content_rejected() {
    let secret = SharedSecret::from_bytes([0x5a; 32]);
    let request = RpcRequest {
        action: RpcAction {
            method: "eth_requestAccounts".to_string(),
            params: json!([]),
        },
        chain_id: 8453,
    };
    let envelope = encrypt_content(&request, &secret).unwrap();

    for i in 0..envelope.cipher_text.len() {
        let mut tampered = envelope.clone();
        tampered.cipher_text[i] = tampered.cipher_text[i].wrapping_add(1);
        assert!(decrypt_content::<RpcRequest>(&tampered, &secret).is_err());
    }
    for i in 0..envelope.iv.len() {
        let mut tampered = envelope.clone();
        tampered.iv[i] = tampered.iv[i].wrapping_add(1);
        assert_eq!(
            decrypt_content::<RpcRequest>(&tampered, &secret),
            Err(CryptoError::Decryption)
        );
    }
}

/// Full request/response exchange with the envelope passed as JSON text,
/// the way it crosses the relay.
#[test]
fn test_request_response_over_json() {
    let wallet = generate_key_pair();
    let app = generate_key_pair();

    let app_session = SessionCipher::new(&app.private_key, &wallet.public_key);
    let wallet_session = SessionCipher::new(&wallet.private_key, &app.public_key);

    let request = RpcRequest {
        action: RpcAction {
            method: "personal_sign".to_string(),
            params: json!({ "message": "0x68656c6c6f", "address": "0xabc" }),
        },
        chain_id: 1,
    };
    let wire = app_session.encrypt_request(&request).unwrap().to_json().unwrap();
    let received = wallet_session
        .decrypt_request(&EncryptedEnvelope::from_json(&wire).unwrap())
        .unwrap();
    assert_eq!(received, request);

    let response = RpcResponse::error(4001, "User denied message signature");
    let wire = wallet_session.encrypt_response(&response).unwrap().to_hex();
    let received = app_session
        .decrypt_response(&EncryptedEnvelope::from_hex(&wire).unwrap())
        .unwrap();
    assert_eq!(received, response);
}
