//! Container round-trip tests across the size matrix and both key modes.

use std::fs;
use std::sync::OnceLock;

use tempfile::TempDir;

use mcrypt_container::{DecryptMode, EncryptMode, FileCrypter};
use mcrypt_core::config::{ContainerConfig, SymmetricConfig};
use mcrypt_core::{CryptoError, KeySize};
use mcrypt_crypto::asymmetric::{generate_keypair, RsaKeyPair};
use mcrypt_crypto::material::Key;
use mcrypt_crypto::symmetric::SymmetricEngine;

fn crypter() -> FileCrypter {
    FileCrypter::new(
        SymmetricEngine::new(&SymmetricConfig {
            timing_floor_ms: 0,
            allow_fallback: false,
        }),
        ContainerConfig::default(),
    )
}

fn rsa_pair() -> &'static RsaKeyPair {
    static PAIR: OnceLock<RsaKeyPair> = OnceLock::new();
    PAIR.get_or_init(|| generate_keypair(2048).unwrap())
}

fn patterned(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 5)) as u8)
        .collect()
}

#[test]
fn symmetric_roundtrip_size_matrix() {
    let crypter = crypter();
    let key = Key::generate(KeySize::Bits256);

    for size in [0usize, 1, 64 * 1024, 1024 * 1024 + 4096] {
        let tmp = TempDir::new().unwrap();
        let content = patterned(size);
        let src = tmp.path().join("data.bin.txt");
        fs::write(&src, &content).unwrap();

        let enc = tmp.path().join("data.encrypted");
        let out = tmp.path().join("data.out");

        crypter
            .encrypt_file(&src, &enc, &EncryptMode::Symmetric(&key))
            .unwrap();
        crypter
            .decrypt_file(&enc, &out, &DecryptMode::Symmetric(&key))
            .unwrap();

        assert_eq!(
            fs::read(&out).unwrap(),
            content,
            "byte-for-byte round trip at {size} bytes"
        );
    }
}

#[test]
fn hybrid_roundtrip_large_payload() {
    let crypter = crypter();
    let pair = rsa_pair();
    let tmp = TempDir::new().unwrap();

    // Far beyond what RSA alone could carry
    let content = patterned(256 * 1024);
    let src = tmp.path().join("big.txt");
    fs::write(&src, &content).unwrap();

    let enc = tmp.path().join("big.encrypted");
    let out = tmp.path().join("big.out");

    let metadata = crypter
        .encrypt_file(
            &src,
            &enc,
            &EncryptMode::Hybrid {
                recipient: pair.public(),
                signer: None,
            },
        )
        .unwrap();
    assert_eq!(metadata.encryption_algorithm.to_string(), "HYBRID-RSA-AES");

    crypter
        .decrypt_file(
            &enc,
            &out,
            &DecryptMode::Hybrid {
                private: pair.private(),
                verifier: None,
            },
        )
        .unwrap();
    assert_eq!(fs::read(&out).unwrap(), content);
}

#[test]
fn hybrid_signed_roundtrip_and_tamper() {
    let crypter = crypter();
    let pair = rsa_pair();
    let tmp = TempDir::new().unwrap();

    let src = tmp.path().join("signed.txt");
    fs::write(&src, b"signed container payload").unwrap();

    let enc = tmp.path().join("signed.encrypted");
    crypter
        .encrypt_file(
            &src,
            &enc,
            &EncryptMode::Hybrid {
                recipient: pair.public(),
                signer: Some(pair.private()),
            },
        )
        .unwrap();

    // Valid signature verifies
    let out = tmp.path().join("signed.out");
    crypter
        .decrypt_file(
            &enc,
            &out,
            &DecryptMode::Hybrid {
                private: pair.private(),
                verifier: Some(pair.public()),
            },
        )
        .unwrap();
    assert_eq!(fs::read(&out).unwrap(), b"signed container payload");

    // Corrupt the embedded envelope: signature check fails fast
    let mut container = fs::read(&enc).unwrap();
    let last = container.len() - 1;
    container[last] ^= 0x01;
    fs::write(&enc, &container).unwrap();

    let out2 = tmp.path().join("signed.out2");
    let err = crypter
        .decrypt_file(
            &enc,
            &out2,
            &DecryptMode::Hybrid {
                private: pair.private(),
                verifier: Some(pair.public()),
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CryptoError::SignatureVerification | CryptoError::Serialization(_)
    ));
    assert!(!out2.exists());
}
