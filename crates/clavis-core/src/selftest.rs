//! Startup self-test: replay published vectors before trusting anything.
//!
//! [`run_self_test`] drives the derivation engine's primitives, the
//! formatter, and the cipher through fixed input/output pairs and compares
//! every result byte-for-byte. A single mismatch latches the process-wide
//! gate: from then on every derivation and encryption entry point refuses
//! with [`CoreError::SelfTestFailed`] until a corrected build is
//! installed. The core never discloses a secret whose arithmetic it has
//! not verified.
//!
//! Vector sources:
//! - Argon2id: RFC 9106 §5.4 known-answer test
//! - AES-256-GCM: NIST SP 800-38D test cases 14 and 16
//! - BLAKE3: official empty-input vector
//! - Formatter: pinned renderings of fixed byte streams
//!
//! The composed `derive()` is additionally checked for determinism and
//! service/counter separation at the floor work factor.

use std::sync::atomic::{AtomicU8, Ordering};

use crate::cipher::{self, SealedPassword};
use crate::error::CoreError;
use crate::formatter::{self, Constraints};
use crate::kdf::{self, constant_time_eq, MIN_WORK_FACTOR};

// ---------------------------------------------------------------------------
// Operation gate
// ---------------------------------------------------------------------------

const STATE_UNVERIFIED: u8 = 0;
const STATE_PASSED: u8 = 1;
const STATE_FAILED: u8 = 2;

static STATE: AtomicU8 = AtomicU8::new(STATE_UNVERIFIED);

/// Run the full vector replay and latch the result.
///
/// Invoked once at process startup, before any other entry point is
/// reachable; the caller treats a failure as fatal and a mismatch also
/// latches the in-core gate as a backstop.
///
/// # Errors
///
/// Returns [`CoreError::SelfTestFailed`] naming the first failing stage.
pub fn run_self_test() -> Result<(), CoreError> {
    match run_vectors() {
        Ok(()) => {
            STATE.store(STATE_PASSED, Ordering::Release);
            Ok(())
        }
        Err(e) => {
            STATE.store(STATE_FAILED, Ordering::Release);
            Err(e)
        }
    }
}

/// Refuse derivation/encryption once a self-test has failed.
pub(crate) fn ensure_operational() -> Result<(), CoreError> {
    if STATE.load(Ordering::Acquire) == STATE_FAILED {
        return Err(CoreError::SelfTestFailed(
            "a previous self-test failed; derivation is disabled".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn latch_failure_for_tests() {
    STATE.store(STATE_FAILED, Ordering::Release);
}

#[cfg(test)]
pub(crate) fn reset_gate_for_tests() {
    STATE.store(STATE_UNVERIFIED, Ordering::Release);
}

// ---------------------------------------------------------------------------
// Vector replay
// ---------------------------------------------------------------------------

fn run_vectors() -> Result<(), CoreError> {
    check_argon2_vector(&ARGON2_RFC9106_EXPECTED)?;
    check_blake3_vector(&BLAKE3_EMPTY_EXPECTED)?;
    check_aes_gcm_case_14()?;
    check_aes_gcm_case_16()?;
    run_csf_vectors(CSF_VECTORS)?;
    check_derivation_composition()?;
    Ok(())
}

/// RFC 9106 §5.4 — Argon2id, version 0x13, m=32 KiB, t=3, p=4, with the
/// RFC's secret key and associated data.
const ARGON2_RFC9106_EXPECTED: [u8; 32] = [
    0x0d, 0x64, 0x0d, 0xf5, 0x8d, 0x78, 0x76, 0x6c, 0x08, 0xc0, 0x37, 0xa3, 0x4a, 0x8b, 0x53,
    0xc9, 0xd0, 0x1e, 0xf0, 0x45, 0x2d, 0x75, 0xb6, 0x5e, 0xb5, 0x25, 0x20, 0xe9, 0x6b, 0x01,
    0xe6, 0x59,
];

pub(crate) fn check_argon2_vector(expected: &[u8; 32]) -> Result<(), CoreError> {
    let password = [0x01u8; 32];
    let salt = [0x02u8; 16];
    let secret = [0x03u8; 8];
    let ad_bytes = [0x04u8; 12];

    let stage = "argon2id RFC 9106 vector";
    let ad = argon2::AssociatedData::new(&ad_bytes)
        .map_err(|e| CoreError::SelfTestFailed(format!("{stage}: {e}")))?;
    let mut builder = argon2::ParamsBuilder::new();
    builder.m_cost(32);
    builder.t_cost(3);
    builder.p_cost(4);
    builder.output_len(32);
    builder.data(ad);
    let params = builder
        .build()
        .map_err(|e| CoreError::SelfTestFailed(format!("{stage}: {e}")))?;

    let argon2 = argon2::Argon2::new_with_secret(
        &secret,
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    )
    .map_err(|e| CoreError::SelfTestFailed(format!("{stage}: {e}")))?;

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(&password, &salt, &mut output)
        .map_err(|e| CoreError::SelfTestFailed(format!("{stage}: {e}")))?;

    if !constant_time_eq(&output, expected) {
        return Err(CoreError::SelfTestFailed(format!("{stage}: output mismatch")));
    }
    Ok(())
}

/// Official BLAKE3 vector: the hash of the empty input.
const BLAKE3_EMPTY_EXPECTED: [u8; 32] = [
    0xaf, 0x13, 0x49, 0xb9, 0xf5, 0xf9, 0xa1, 0xa6, 0xa0, 0x40, 0x4d, 0xea, 0x36, 0xdc, 0xc9,
    0x49, 0x9b, 0xcb, 0x25, 0xc9, 0xad, 0xc1, 0x12, 0xb7, 0xcc, 0x9a, 0x93, 0xca, 0xe4, 0x1f,
    0x32, 0x62,
];

pub(crate) fn check_blake3_vector(expected: &[u8; 32]) -> Result<(), CoreError> {
    let hash = blake3::hash(b"");
    if !constant_time_eq(hash.as_bytes(), expected) {
        return Err(CoreError::SelfTestFailed(
            "blake3 empty-input vector: output mismatch".into(),
        ));
    }

    // The salt hash must be stable and must separate names and counters.
    let a = kdf::service_salt("selftest.invalid", 0);
    if !constant_time_eq(&a, &kdf::service_salt("selftest.invalid", 0)) {
        return Err(CoreError::SelfTestFailed(
            "service salt: not deterministic".into(),
        ));
    }
    if constant_time_eq(&a, &kdf::service_salt("selftest.invalid", 1))
        || constant_time_eq(&a, &kdf::service_salt("selftest2.invalid", 0))
    {
        return Err(CoreError::SelfTestFailed(
            "service salt: context separation lost".into(),
        ));
    }
    Ok(())
}

/// NIST SP 800-38D test case 14: all-zero key, nonce, and 16-byte block.
fn check_aes_gcm_case_14() -> Result<(), CoreError> {
    let stage = "AES-256-GCM NIST case 14";
    let expected_ct: [u8; 16] = [
        0xce, 0xa7, 0x40, 0x3d, 0x4d, 0x60, 0x6b, 0x6e, 0x07, 0x4e, 0xc5, 0xd3, 0xba, 0xf3, 0x9d,
        0x18,
    ];
    let expected_tag: [u8; 16] = [
        0xd0, 0xd1, 0xc8, 0xa7, 0x99, 0x99, 0x6b, 0xf0, 0x26, 0x5b, 0x98, 0xb5, 0xd4, 0x8a, 0xb9,
        0x19,
    ];

    let sealed = cipher::seal_with_nonce(&[0u8; 32], [0u8; 12], &[], &[0u8; 16])
        .map_err(|e| CoreError::SelfTestFailed(format!("{stage}: {e}")))?;
    if !constant_time_eq(&sealed.ciphertext, &expected_ct)
        || !constant_time_eq(&sealed.tag, &expected_tag)
    {
        return Err(CoreError::SelfTestFailed(format!("{stage}: output mismatch")));
    }
    Ok(())
}

/// NIST SP 800-38D test case 16: 60-byte plaintext with AAD, checked in
/// both directions plus a forced tag-mismatch.
fn check_aes_gcm_case_16() -> Result<(), CoreError> {
    let stage = "AES-256-GCM NIST case 16";
    let key: [u8; 32] = [
        0xfe, 0xff, 0xe9, 0x92, 0x86, 0x65, 0x73, 0x1c, 0x6d, 0x6a, 0x8f, 0x94, 0x67, 0x30, 0x83,
        0x08, 0xfe, 0xff, 0xe9, 0x92, 0x86, 0x65, 0x73, 0x1c, 0x6d, 0x6a, 0x8f, 0x94, 0x67, 0x30,
        0x83, 0x08,
    ];
    let nonce: [u8; 12] = [
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

    let sealed = cipher::seal_with_nonce(&key, nonce, &aad, &plaintext)
        .map_err(|e| CoreError::SelfTestFailed(format!("{stage}: {e}")))?;
    if !constant_time_eq(&sealed.ciphertext, &expected_ct)
        || !constant_time_eq(&sealed.tag, &expected_tag)
    {
        return Err(CoreError::SelfTestFailed(format!(
            "{stage}: seal output mismatch"
        )));
    }

    let opened = cipher::open(&key, &sealed, &aad)
        .map_err(|e| CoreError::SelfTestFailed(format!("{stage}: open failed: {e}")))?;
    if !constant_time_eq(opened.expose(), &plaintext) {
        return Err(CoreError::SelfTestFailed(format!(
            "{stage}: open output mismatch"
        )));
    }

    // A flipped tag bit must be rejected, or authentication is broken.
    let mut tampered = SealedPassword {
        nonce: sealed.nonce,
        ciphertext: sealed.ciphertext.clone(),
        tag: sealed.tag,
    };
    tampered.tag[0] ^= 0x01;
    if cipher::open(&key, &tampered, &aad).is_ok() {
        return Err(CoreError::SelfTestFailed(format!(
            "{stage}: tampered tag accepted"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatter vectors
// ---------------------------------------------------------------------------

pub(crate) struct CsfVector {
    pub(crate) name: &'static str,
    pub(crate) input: &'static [u8],
    pub(crate) constraints: fn() -> Constraints,
    pub(crate) expected: &'static str,
}

fn identity_constraints() -> Constraints {
    Constraints {
        truncate: true,
        max_length: 16,
        ..Constraints::default()
    }
}

fn repair_constraints() -> Constraints {
    Constraints {
        min_caps: 1,
        min_digits: 1,
        truncate: true,
        max_length: 8,
        ..Constraints::default()
    }
}

fn collapsed_constraints() -> Constraints {
    Constraints {
        case_sensitive: false,
        min_caps: 1,
        extra_symbols: ['#', '!'].into_iter().collect(),
        truncate: true,
        max_length: 6,
        ..Constraints::default()
    }
}

pub(crate) const CSF_VECTORS: &[CsfVector] = &[
    CsfVector {
        name: "identity rendering",
        input: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
        constraints: identity_constraints,
        expected: "abcdefghijklmnop",
    },
    CsfVector {
        name: "substitution repair",
        input: &[0, 1, 2, 3, 4, 5, 6, 7, 9, 3],
        constraints: repair_constraints,
        expected: "9Dcdefgh",
    },
    CsfVector {
        name: "rejection and collapsed case",
        input: &[240, 36, 37, 0, 26, 27, 10],
        constraints: collapsed_constraints,
        expected: "!#a01k",
    },
];

pub(crate) fn run_csf_vectors(vectors: &[CsfVector]) -> Result<(), CoreError> {
    for vector in vectors {
        let constraints = (vector.constraints)();
        let rendered = formatter::format(vector.input, &constraints)
            .map_err(|e| CoreError::SelfTestFailed(format!("formatter {}: {e}", vector.name)))?;
        if !constant_time_eq(rendered.as_bytes(), vector.expected.as_bytes()) {
            return Err(CoreError::SelfTestFailed(format!(
                "formatter {}: output mismatch",
                vector.name
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Composition checks
// ---------------------------------------------------------------------------

/// Determinism and separation of the composed derivation at the floor
/// work factor.
fn check_derivation_composition() -> Result<(), CoreError> {
    let stage = "derivation composition";
    let secret = b"self-test composition secret";
    let run = |name: &str, counter: u64| {
        kdf::derive(secret, name, counter, MIN_WORK_FACTOR, 32)
            .map_err(|e| CoreError::SelfTestFailed(format!("{stage}: {e}")))
    };

    let first = run("selftest.invalid", 0)?;
    let again = run("selftest.invalid", 0)?;
    if !constant_time_eq(first.expose(), again.expose()) {
        return Err(CoreError::SelfTestFailed(format!(
            "{stage}: derivation is not deterministic"
        )));
    }

    let regenerated = run("selftest.invalid", 1)?;
    let other_service = run("selftest2.invalid", 0)?;
    if constant_time_eq(first.expose(), regenerated.expose())
        || constant_time_eq(first.expose(), other_service.expose())
    {
        return Err(CoreError::SelfTestFailed(format!(
            "{stage}: context separation lost"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // The only test allowed to move the gate state: a pass opens the
    // gate, a latched failure closes both secret-deriving entry points.
    #[test]
    fn self_test_passes_and_the_gate_latches_on_failure() {
        run_self_test().expect("self-test should pass on a conformant build");

        let master =
            crate::memory::MasterSecret::new(b"gate probe secret").expect("allocation");
        let descriptor = crate::service::ServiceDescriptor::new_generate(
            "gate-probe.invalid",
            Constraints::default(),
        )
        .expect("descriptor should validate");
        crate::service::generate_or_fetch(&descriptor, &master)
            .expect("the gate should be open after a pass");

        latch_failure_for_tests();
        assert!(matches!(
            crate::service::generate_or_fetch(&descriptor, &master),
            Err(CoreError::SelfTestFailed(_))
        ));
        assert!(matches!(
            crate::service::encrypt_password("gate-probe.invalid", &master, "pw"),
            Err(CoreError::SelfTestFailed(_))
        ));
        reset_gate_for_tests();
    }

    #[test]
    fn one_bit_fault_in_argon2_vector_is_detected() {
        let mut expected = ARGON2_RFC9106_EXPECTED;
        expected[0] ^= 0x01;
        let err = check_argon2_vector(&expected)
            .expect_err("a one-bit fault must not pass the vector check");
        assert!(matches!(err, CoreError::SelfTestFailed(_)));
    }

    #[test]
    fn one_bit_fault_in_blake3_vector_is_detected() {
        let mut expected = BLAKE3_EMPTY_EXPECTED;
        expected[31] ^= 0x80;
        let err = check_blake3_vector(&expected)
            .expect_err("a one-bit fault must not pass the vector check");
        assert!(matches!(err, CoreError::SelfTestFailed(_)));
    }

    #[test]
    fn corrupted_formatter_vector_is_detected() {
        let faulty = [CsfVector {
            name: "identity rendering (faulted)",
            input: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
            constraints: identity_constraints,
            expected: "abcdefghijklmnoq",
        }];
        let err = run_csf_vectors(&faulty).expect_err("a faulted vector must be detected");
        assert!(matches!(err, CoreError::SelfTestFailed(_)));
    }

    #[test]
    fn formatter_vectors_match_pinned_outputs() {
        run_csf_vectors(CSF_VECTORS).expect("pinned vectors should pass");
    }
}
