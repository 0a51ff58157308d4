//! Error types for `clavis-core`.

use thiserror::Error;

/// Errors produced by the derivation core.
///
/// Every failure is reported to the caller as a typed result; the core
/// never substitutes a weaker-but-working derivation. [`Self::SelfTestFailed`]
/// is the one process-fatal condition: once observed, the operation gate
/// refuses all further derivation and encryption calls.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Caller-supplied input was unusable (blank master secret, empty
    /// service name, zero output length, zero work factor).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The constraint policy cannot be satisfied, or the bounded
    /// deterministic draw budget ran out before it was.
    #[error("password generation failed: {0}")]
    GenerationFailed(String),

    /// Authentication tag verification failed — wrong master secret or
    /// tampered ciphertext/nonce.
    #[error("decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    /// Work-factor calibration probes did not bracket the target latency
    /// within the probe bound.
    #[error("calibration failed: {0}")]
    CalibrationFailed(String),

    /// A known-answer vector replay produced the wrong bytes.
    #[error("self-test failed: {0}")]
    SelfTestFailed(String),

    /// The caller cancelled a calibration in progress.
    #[error("operation cancelled")]
    Cancelled,

    /// Argon2id parameter validation or memory allocation failure not
    /// attributable to caller input.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Secure buffer allocation or process hardening failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),

    /// Service record encoding or decoding failure.
    #[error("record format error: {0}")]
    RecordFormat(String),
}
