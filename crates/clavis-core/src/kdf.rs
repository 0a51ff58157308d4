//! Argon2id key derivation engine.
//!
//! [`derive`] turns `(master secret, service name, counter, work factor)`
//! into a deterministic pseudorandom byte stream: identical inputs produce
//! identical output on every platform and every run. The service name and
//! counter are non-secret context, hashed into the salt so that two
//! services — or two regenerations of one service — never share an
//! effective key under the same master secret.
//!
//! Cost model: memory is pinned at [`MEMORY_COST_KIB`] and the time cost
//! equals the work factor, so latency grows monotonically with the work
//! factor and a captured record's brute-force bound does not depend on
//! which machine wrote it.

use crate::error::CoreError;
use crate::memory::SecretBuffer;
use zeroize::Zeroize;

/// Argon2id memory cost in KiB (19 MiB), fixed across all work factors.
pub const MEMORY_COST_KIB: u32 = 19_456;

/// Argon2id lane count. Single-lane keeps the cost model one-dimensional.
pub const LANES: u32 = 1;

/// Security floor for the work factor. With 19 MiB of memory, two passes
/// is the accepted Argon2id minimum; calibration never returns less.
pub const MIN_WORK_FACTOR: u32 = 2;

/// Smallest output the Argon2 primitive will produce.
const MIN_OUTPUT_LEN: usize = 4;

/// Domain-separation context for turning service identity into a salt.
/// Changing this string is a format break: every derived password changes.
const SALT_CONTEXT: &str = "clavis-core 2026-06-01 per-service salt v1";

/// Hash the non-secret service context into a 32-byte Argon2 salt.
///
/// The service name is length-prefixed so `("ab", c)` and `("a", ...)` can
/// never collide, and the counter is mixed in little-endian so each
/// regeneration reseeds the derivation.
#[must_use]
pub fn service_salt(service_name: &str, counter: u64) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(SALT_CONTEXT);
    hasher.update(&(service_name.len() as u64).to_le_bytes());
    hasher.update(service_name.as_bytes());
    hasher.update(&counter.to_le_bytes());
    *hasher.finalize().as_bytes()
}

/// Derive `output_len` bytes from the master secret and service context.
///
/// Deterministic and CPU/memory-bound by design; callers run it off any
/// interactive thread. The intermediate output buffer is zeroized after
/// being copied into the returned [`SecretBuffer`].
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] if the master secret or service
/// name is empty, `output_len` is below the primitive's 4-byte floor, or
/// `work_factor` is zero. Returns [`CoreError::KeyDerivation`] if Argon2id
/// itself rejects the parameters or fails to allocate.
pub fn derive(
    master_secret: &[u8],
    service_name: &str,
    counter: u64,
    work_factor: u32,
    output_len: usize,
) -> Result<SecretBuffer, CoreError> {
    if master_secret.is_empty() {
        return Err(CoreError::InvalidInput("master secret is empty".into()));
    }
    if service_name.is_empty() {
        return Err(CoreError::InvalidInput("service name is empty".into()));
    }
    if output_len < MIN_OUTPUT_LEN {
        return Err(CoreError::InvalidInput(format!(
            "output length {output_len} is below the {MIN_OUTPUT_LEN}-byte minimum"
        )));
    }
    if work_factor == 0 {
        return Err(CoreError::InvalidInput("work factor is zero".into()));
    }

    let params = argon2::Params::new(MEMORY_COST_KIB, work_factor, LANES, Some(output_len))
        .map_err(|e| CoreError::KeyDerivation(format!("invalid argon2 params: {e}")))?;
    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params,
    );

    let salt = service_salt(service_name, counter);
    let mut output = vec![0u8; output_len];
    if let Err(e) = argon2.hash_password_into(master_secret, &salt, &mut output) {
        output.zeroize();
        return Err(CoreError::KeyDerivation(format!(
            "argon2id derivation failed: {e}"
        )));
    }

    let result = SecretBuffer::new(&output);
    output.zeroize();
    result
}

/// Constant-time byte comparison for secret-dependent data.
///
/// Bitwise-OR accumulation avoids short-circuit timing leaks. The early
/// length check is acceptable because every caller compares buffers of a
/// public, fixed length.
#[must_use]
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
