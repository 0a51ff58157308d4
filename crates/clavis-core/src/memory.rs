//! Secret lifetime control.
//!
//! Every sensitive value the core touches lives in one of three wrappers:
//! - [`MasterSecret`] — the caller's memorized secret, scoped to one call
//! - [`SecretBuffer`] — derived key material and decrypted plaintext
//! - [`Password`] — a generated or recovered service password
//!
//! All three zeroize their contents on drop, on every exit path, and mask
//! their `Debug` output so a stray format call cannot leak bytes into a
//! log. Buffers are additionally `mlock`'d where the platform allows it,
//! with a soft fallback when it does not.

use crate::error::CoreError;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use zeroize::Zeroize;

// ---------------------------------------------------------------------------
// mlock guard
// ---------------------------------------------------------------------------

/// RAII guard that `munlock`s a memory region on drop.
///
/// `mlock` failure (quota, privileges) is a soft fallback: the region stays
/// unlocked, a warning is printed once per process, and no error is raised.
struct LockedRegion {
    ptr: *const u8,
    len: usize,
    locked: bool,
}

// SAFETY: the pointer is only handed to mlock/munlock, which are
// thread-safe; the pointed-to data is owned by the enclosing buffer and
// never dereferenced through this guard.
unsafe impl Send for LockedRegion {}
unsafe impl Sync for LockedRegion {}

impl LockedRegion {
    fn try_lock(ptr: *const u8, len: usize) -> Self {
        let locked = platform::try_mlock(ptr, len);
        if !locked && len > 0 {
            static WARNED: std::sync::Once = std::sync::Once::new();
            WARNED.call_once(|| {
                eprintln!(
                    "[clavis-core] WARNING: mlock failed — secret data may be \
                     swapped to disk. Consider raising RLIMIT_MEMLOCK."
                );
            });
        }
        Self { ptr, len, locked }
    }

    const fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for LockedRegion {
    fn drop(&mut self) {
        if self.locked {
            platform::try_munlock(self.ptr, self.len);
        }
    }
}

// ---------------------------------------------------------------------------
// SecretBuffer
// ---------------------------------------------------------------------------

/// Variable-length buffer for key material and decrypted plaintext.
///
/// Zeroized on drop via `secrecy`, `mlock`'d on allocation, masked in
/// `Debug`. Produced by the derivation engine and the cipher; never
/// retained past the call that produced it.
pub struct SecretBuffer {
    inner: SecretSlice<u8>,
    lock: LockedRegion,
}

impl SecretBuffer {
    /// Copy `data` into a new zeroize-on-drop allocation.
    ///
    /// The caller should zeroize the source after this returns.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SecureMemory`] if allocation fails.
    pub fn new(data: &[u8]) -> Result<Self, CoreError> {
        let inner: SecretSlice<u8> = data.to_vec().into();
        let exposed = inner.expose_secret();
        let lock = LockedRegion::try_lock(exposed.as_ptr(), exposed.len());
        Ok(Self { inner, lock })
    }

    /// Expose the underlying bytes for a cryptographic operation.
    /// Keep the exposure to a single expression where possible.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Number of bytes in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// `true` if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if the underlying memory is currently `mlock`'d.
    #[must_use]
    pub const fn is_mlocked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

// ---------------------------------------------------------------------------
// MasterSecret
// ---------------------------------------------------------------------------

/// The one memorized value everything is derived from.
///
/// Exists only for the duration of a single core call; the core never
/// copies it into long-lived state, logs it, or persists it. The wrapper
/// erases its contents when dropped, which the call scope guarantees on
/// success and error paths alike.
pub struct MasterSecret {
    inner: SecretBuffer,
}

impl MasterSecret {
    /// Wrap the caller's secret bytes. The caller should zeroize its own
    /// copy once this returns.
    ///
    /// Emptiness is diagnosed at derivation time, not here, so a UI can
    /// construct the wrapper before validation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SecureMemory`] if allocation fails.
    pub fn new(secret: &[u8]) -> Result<Self, CoreError> {
        Ok(Self {
            inner: SecretBuffer::new(secret)?,
        })
    }

    /// Expose the secret bytes for derivation.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose()
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterSecret(***)")
    }
}

// ---------------------------------------------------------------------------
// Password
// ---------------------------------------------------------------------------

/// A generated or recovered service password.
///
/// Zeroized on drop and masked in `Debug`; the plaintext is reachable only
/// through [`Self::reveal`], which keeps accidental logging visible in
/// review.
pub struct Password {
    plaintext: String,
}

impl Password {
    pub(crate) fn new(plaintext: String) -> Self {
        Self { plaintext }
    }

    /// The password text, for display or clipboard handoff.
    #[must_use]
    pub fn reveal(&self) -> &str {
        &self.plaintext
    }

    /// Password length in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plaintext.chars().count()
    }

    /// `true` if the password is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plaintext.is_empty()
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.plaintext.zeroize();
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

// ---------------------------------------------------------------------------
// Core dump disabling
// ---------------------------------------------------------------------------

/// Disable core dumps for the current process.
///
/// On Unix sets `RLIMIT_CORE` to 0 (soft and hard); elsewhere a no-op.
///
/// # Errors
///
/// Returns [`CoreError::SecureMemory`] if `setrlimit` fails.
pub fn disable_core_dumps() -> Result<(), CoreError> {
    platform::disable_core_dumps_impl()
}

// ---------------------------------------------------------------------------
// Platform-specific implementations
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod platform {
    use crate::error::CoreError;

    pub(super) fn try_mlock(ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        // SAFETY: mlock accepts any valid pointer/length pair; an invalid
        // region yields ENOMEM which we report as "not locked".
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn try_munlock(ptr: *const u8, len: usize) {
        if len == 0 {
            return;
        }
        // SAFETY: munlock is safe to call; failure is non-critical.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }

    pub(super) fn disable_core_dumps_impl() -> Result<(), CoreError> {
        let limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit with RLIMIT_CORE is a standard POSIX call.
        let ret = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const limit) };
        if ret != 0 {
            return Err(CoreError::SecureMemory(
                "failed to disable core dumps via RLIMIT_CORE".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod platform {
    use crate::error::CoreError;

    pub(super) fn try_mlock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn try_munlock(_ptr: *const u8, _len: usize) {}

    pub(super) fn disable_core_dumps_impl() -> Result<(), CoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
