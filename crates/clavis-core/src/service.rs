//! Service descriptors and the API surface the application consumes.
//!
//! A [`ServiceDescriptor`] is the persisted policy+state record for one
//! managed service; the storage collaborator owns where it lives, this
//! module owns what it means. The entry points are free functions over
//! explicit inputs: [`generate_or_fetch`] produces the service password,
//! [`regenerate`] advances the version counter, [`encrypt_password`]
//! seals a pre-existing password. The process-wide default work factor is
//! read at descriptor creation and never rewrites an existing record.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::cipher::{self, SealedPassword, ENCRYPT_COUNTER};
use crate::error::CoreError;
use crate::formatter::{self, Constraints};
use crate::kdf::{self, MIN_WORK_FACTOR};
use crate::memory::{MasterSecret, Password};
use crate::selftest;

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// How a service's password is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Derived on demand through the formatter; nothing stored.
    Generate,
    /// A caller-supplied password, stored sealed.
    Encrypt,
}

/// Persisted record for one registered service.
///
/// Name uniqueness across the store is the storage collaborator's
/// invariant; everything else is validated here. `work_factor` is
/// captured when the record is created or regenerated and is immutable
/// for that record version afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    /// Unique service identifier, non-empty.
    pub name: String,
    /// Operating mode.
    pub mode: ServiceMode,
    /// Character policy for generated passwords.
    #[serde(default)]
    pub constraints: Constraints,
    /// Version counter for Generate mode; increments only.
    #[serde(default)]
    pub regeneration_count: u64,
    /// Sealed password; present exactly when `mode` is Encrypt.
    #[serde(default)]
    pub sealed: Option<SealedPassword>,
    /// Derivation cost captured when this record version was written.
    pub work_factor: u32,
}

impl ServiceDescriptor {
    /// Register a Generate-mode service under the current default work
    /// factor.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for an empty name and
    /// [`CoreError::GenerationFailed`] for an infeasible policy.
    pub fn new_generate(name: impl Into<String>, constraints: Constraints) -> Result<Self, CoreError> {
        let descriptor = Self {
            name: name.into(),
            mode: ServiceMode::Generate,
            constraints,
            regeneration_count: 0,
            sealed: None,
            work_factor: default_work_factor(),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Register an Encrypt-mode service around an already-sealed password.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for an empty name or a zero
    /// work factor.
    pub fn new_encrypt(
        name: impl Into<String>,
        sealed: SealedPassword,
        work_factor: u32,
    ) -> Result<Self, CoreError> {
        let descriptor = Self {
            name: name.into(),
            mode: ServiceMode::Encrypt,
            constraints: Constraints::default(),
            regeneration_count: 0,
            sealed: Some(sealed),
            work_factor,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check the record invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] for structural violations and
    /// [`CoreError::GenerationFailed`] for an infeasible policy.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.is_empty() {
            return Err(CoreError::InvalidInput("service name is empty".into()));
        }
        if self.work_factor == 0 {
            return Err(CoreError::InvalidInput("work factor is zero".into()));
        }
        match self.mode {
            ServiceMode::Generate => {
                if self.sealed.is_some() {
                    return Err(CoreError::InvalidInput(
                        "generate-mode record carries a sealed password".into(),
                    ));
                }
                if self.regeneration_count >= ENCRYPT_COUNTER {
                    return Err(CoreError::InvalidInput(
                        "regeneration counter reached the reserved encrypt value".into(),
                    ));
                }
                self.constraints.validate()?;
            }
            ServiceMode::Encrypt => {
                if self.sealed.is_none() {
                    return Err(CoreError::InvalidInput(
                        "encrypt-mode record is missing its sealed password".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Process-wide default work factor
// ---------------------------------------------------------------------------

static DEFAULT_WORK_FACTOR: AtomicU32 = AtomicU32::new(MIN_WORK_FACTOR);

/// The default cost applied to services created from now on.
#[must_use]
pub fn default_work_factor() -> u32 {
    DEFAULT_WORK_FACTOR.load(Ordering::Acquire)
}

/// Install a calibrated default cost. Existing records keep the work
/// factor they were written with.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] for a zero work factor.
pub fn set_default_work_factor(work_factor: u32) -> Result<(), CoreError> {
    if work_factor == 0 {
        return Err(CoreError::InvalidInput("work factor is zero".into()));
    }
    DEFAULT_WORK_FACTOR.store(work_factor, Ordering::Release);
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Produce the service password: format a derivation (Generate) or open
/// the stored ciphertext (Encrypt).
///
/// The master secret is scoped to this call and erased when the wrapper
/// drops, on success and error paths alike.
///
/// # Errors
///
/// Returns [`CoreError::SelfTestFailed`] once the self-test gate has
/// latched; otherwise the descriptor's validation errors,
/// [`CoreError::GenerationFailed`], or [`CoreError::DecryptionFailed`].
pub fn generate_or_fetch(
    descriptor: &ServiceDescriptor,
    master_secret: &MasterSecret,
) -> Result<Password, CoreError> {
    selftest::ensure_operational()?;
    route(descriptor, master_secret)
}

fn route(
    descriptor: &ServiceDescriptor,
    master_secret: &MasterSecret,
) -> Result<Password, CoreError> {
    descriptor.validate()?;
    match descriptor.mode {
        ServiceMode::Generate => {
            let budget = formatter::draw_budget(&descriptor.constraints);
            let derived = kdf::derive(
                master_secret.expose(),
                &descriptor.name,
                descriptor.regeneration_count,
                descriptor.work_factor,
                budget,
            )?;
            let rendered = formatter::format(derived.expose(), &descriptor.constraints)?;
            Ok(Password::new(rendered))
        }
        ServiceMode::Encrypt => {
            let sealed = descriptor
                .sealed
                .as_ref()
                .ok_or_else(|| CoreError::InvalidInput("sealed password missing".into()))?;
            let plaintext = cipher::decrypt(
                master_secret,
                &descriptor.name,
                descriptor.work_factor,
                sealed,
            )?;
            let text = String::from_utf8(plaintext.expose().to_vec()).map_err(|_| {
                CoreError::RecordFormat("stored password is not valid UTF-8".into())
            })?;
            Ok(Password::new(text))
        }
    }
}

/// Advance a Generate-mode service to its next password version.
///
/// Returns the successor record; the caller persists it. Pure data
/// transform — no derivation happens here.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] for an Encrypt-mode record or a
/// counter that would collide with the reserved encrypt value.
pub fn regenerate(descriptor: &ServiceDescriptor) -> Result<ServiceDescriptor, CoreError> {
    descriptor.validate()?;
    if descriptor.mode != ServiceMode::Generate {
        return Err(CoreError::InvalidInput(
            "only generate-mode services regenerate".into(),
        ));
    }
    let next_count = descriptor
        .regeneration_count
        .checked_add(1)
        .filter(|&c| c < ENCRYPT_COUNTER)
        .ok_or_else(|| {
            CoreError::InvalidInput("regeneration counter exhausted".into())
        })?;
    let mut next = descriptor.clone();
    next.regeneration_count = next_count;
    next.work_factor = default_work_factor();
    Ok(next)
}

/// Seal a pre-existing password for an Encrypt-mode record.
///
/// Returns the sealed password together with the work factor it was
/// sealed under; both go into the descriptor the caller persists.
///
/// # Errors
///
/// Returns [`CoreError::SelfTestFailed`] once the gate has latched,
/// [`CoreError::InvalidInput`] for an empty name, secret, or plaintext.
pub fn encrypt_password(
    service_name: &str,
    master_secret: &MasterSecret,
    plaintext: &str,
) -> Result<(SealedPassword, u32), CoreError> {
    selftest::ensure_operational()?;
    if plaintext.is_empty() {
        return Err(CoreError::InvalidInput("password to store is empty".into()));
    }
    let work_factor = default_work_factor();
    let sealed = cipher::encrypt(
        master_secret,
        service_name,
        work_factor,
        plaintext.as_bytes(),
    )?;
    Ok((sealed, work_factor))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
