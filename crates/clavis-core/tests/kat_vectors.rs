#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Published known-answer vectors against the primitives this core
//! composes: Argon2id (RFC 9106), AES-256-GCM (NIST SP 800-38D), and
//! BLAKE3 (official vectors). The startup self-test replays the same
//! vectors; these tests keep them honest under `cargo test`.

use ring::aead;

/// RFC 9106 Section 5.4 — Argon2id test vector.
///
/// Type: Argon2id, version 0x13, m=32 KiB, t=3, p=4, with the RFC's
/// secret key and associated data, driven through the `argon2` crate the
/// way the engine constructs it.
#[test]
fn rfc9106_section_5_4_argon2id() {
    let password = [0x01u8; 32];
    let salt = [0x02u8; 16];
    let secret = [0x03u8; 8];
    let ad_bytes = [0x04u8; 12];

    let ad = argon2::AssociatedData::new(&ad_bytes).expect("AD should be valid");
    let mut builder = argon2::ParamsBuilder::new();
    builder.m_cost(32);
    builder.t_cost(3);
    builder.p_cost(4);
    builder.output_len(32);
    builder.data(ad);
    let params = builder.build().expect("params with AD should be valid");

    let argon2 = argon2::Argon2::new_with_secret(
        &secret,
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    )
    .expect("argon2 with secret should be valid");

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(&password, &salt, &mut output)
        .expect("hash_password_into should succeed");

    let expected: [u8; 32] = [
        0x0d, 0x64, 0x0d, 0xf5, 0x8d, 0x78, 0x76, 0x6c, 0x08, 0xc0, 0x37, 0xa3, 0x4a, 0x8b, 0x53,
        0xc9, 0xd0, 0x1e, 0xf0, 0x45, 0x2d, 0x75, 0xb6, 0x5e, 0xb5, 0x25, 0x20, 0xe9, 0x6b, 0x01,
        0xe6, 0x59,
    ];

    assert_eq!(
        output, expected,
        "RFC 9106 Section 5.4 Argon2id KAT vector mismatch"
    );
}

/// NIST SP 800-38D Test Case 14 — AES-256-GCM, all-zero key/IV/block.
#[test]
fn nist_test_case_14_aes256_gcm() {
    let key = [0u8; 32];
    let nonce_bytes = [0u8; 12];
    let plaintext = [0u8; 16];

    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key).expect("key should be valid");
    let less_safe_key = aead::LessSafeKey::new(unbound);

    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);
    let mut in_out = plaintext.to_vec();
    let tag = less_safe_key
        .seal_in_place_separate_tag(nonce, aead::Aad::empty(), &mut in_out)
        .expect("seal should succeed");

    let expected_ct: [u8; 16] = [
        0xce, 0xa7, 0x40, 0x3d, 0x4d, 0x60, 0x6b, 0x6e, 0x07, 0x4e, 0xc5, 0xd3, 0xba, 0xf3, 0x9d,
        0x18,
    ];
    let expected_tag: [u8; 16] = [
        0xd0, 0xd1, 0xc8, 0xa7, 0x99, 0x99, 0x6b, 0xf0, 0x26, 0x5b, 0x98, 0xb5, 0xd4, 0x8a, 0xb9,
        0x19,
    ];

    assert_eq!(in_out.as_slice(), &expected_ct, "ciphertext mismatch");
    assert_eq!(tag.as_ref(), &expected_tag, "tag mismatch");
}

/// NIST SP 800-38D Test Case 16 — AES-256-GCM with plaintext and AAD.
#[test]
fn nist_test_case_16_aes256_gcm_with_aad() {
    let key: [u8; 32] = [
        0xfe, 0xff, 0xe9, 0x92, 0x86, 0x65, 0x73, 0x1c, 0x6d, 0x6a, 0x8f, 0x94, 0x67, 0x30, 0x83,
        0x08, 0xfe, 0xff, 0xe9, 0x92, 0x86, 0x65, 0x73, 0x1c, 0x6d, 0x6a, 0x8f, 0x94, 0x67, 0x30,
        0x83, 0x08,
    ];
    let nonce_bytes: [u8; 12] = [
        0xca, 0xfe, 0xba, 0xbe, 0xfa, 0xce, 0xdb, 0xad, 0xde, 0xca, 0xf8, 0x88,
    ];
    let plaintext: [u8; 60] = [
        0xd9, 0x31, 0x32, 0x25, 0xf8, 0x84, 0x06, 0xe5, 0xa5, 0x59, 0x09, 0xc5, 0xaf, 0xf5, 0x26,
        0x9a, 0x86, 0xa7, 0xa9, 0x53, 0x15, 0x34, 0xf7, 0xda, 0x2e, 0x4c, 0x30, 0x3d, 0x8a, 0x31,
        0x8a, 0x72, 0x1c, 0x3c, 0x0c, 0x95, 0x95, 0x68, 0x09, 0x53, 0x2f, 0xcf, 0x0e, 0x24, 0x49,
        0xa6, 0xb5, 0x25, 0xb1, 0x6a, 0xed, 0xf5, 0xaa, 0x0d, 0xe6, 0x57, 0xba, 0x63, 0x7b, 0x39,
    ];
    let aad: [u8; 20] = [
        0xfe, 0xed, 0xfa, 0xce, 0xde, 0xad, 0xbe, 0xef, 0xfe, 0xed, 0xfa, 0xce, 0xde, 0xad, 0xbe,
        0xef, 0xab, 0xad, 0xda, 0xd2,
    ];

    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key).expect("key should be valid");
    let less_safe_key = aead::LessSafeKey::new(unbound);

    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);
    let mut in_out = plaintext.to_vec();
    let tag = less_safe_key
        .seal_in_place_separate_tag(nonce, aead::Aad::from(&aad[..]), &mut in_out)
        .expect("seal should succeed");

    let expected_ct: [u8; 60] = [
        0x52, 0x2d, 0xc1, 0xf0, 0x99, 0x56, 0x7d, 0x07, 0xf4, 0x7f, 0x37, 0xa3, 0x2a, 0x84, 0x42,
        0x7d, 0x64, 0x3a, 0x8c, 0xdc, 0xbf, 0xe5, 0xc0, 0xc9, 0x75, 0x98, 0xa2, 0xbd, 0x25, 0x55,
        0xd1, 0xaa, 0x8c, 0xb0, 0x8e, 0x48, 0x59, 0x0d, 0xbb, 0x3d, 0xa7, 0xb0, 0x8b, 0x10, 0x56,
        0x82, 0x88, 0x38, 0xc5, 0xf6, 0x1e, 0x63, 0x93, 0xba, 0x7a, 0x0a, 0xbc, 0xc9, 0xf6, 0x62,
    ];
    let expected_tag: [u8; 16] = [
        0x76, 0xfc, 0x6e, 0xce, 0x0f, 0x4e, 0x17, 0x68, 0xcd, 0xdf, 0x88, 0x53, 0xbb, 0x2d, 0x55,
        0x1b,
    ];

    assert_eq!(in_out.as_slice(), &expected_ct, "ciphertext mismatch");
    assert_eq!(tag.as_ref(), &expected_tag, "tag mismatch");
}

/// Official BLAKE3 vector — hash of the empty input.
#[test]
fn blake3_empty_input_vector() {
    let expected: [u8; 32] = [
        0xaf, 0x13, 0x49, 0xb9, 0xf5, 0xf9, 0xa1, 0xa6, 0xa0, 0x40, 0x4d, 0xea, 0x36, 0xdc, 0xc9,
        0x49, 0x9b, 0xcb, 0x25, 0xc9, 0xad, 0xc1, 0x12, 0xb7, 0xcc, 0x9a, 0x93, 0xca, 0xe4, 0x1f,
        0x32, 0x62,
    ];
    assert_eq!(blake3::hash(b"").as_bytes(), &expected);
}

/// The engine's salt hash is pinned: derive-key over the fixed context
/// must stay stable across releases, or every stored service breaks.
#[test]
fn service_salt_is_stable_across_calls() {
    let a = clavis_core::service_salt("example.com", 0);
    let b = clavis_core::service_salt("example.com", 0);
    assert_eq!(a, b);
    assert_ne!(a, clavis_core::service_salt("example.com", 1));
    assert_ne!(a, clavis_core::service_salt("example.org", 0));
}
