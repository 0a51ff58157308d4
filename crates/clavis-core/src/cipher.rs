//! Authenticated storage of pre-existing passwords.
//!
//! A service in Encrypt mode keeps a caller-supplied password rather than
//! a generated one. The password is sealed with AES-256-GCM under a key
//! derived from the master secret at a counter value reserved for this
//! mode, so the stored ciphertext and any generated password for the same
//! service never share an effective key. A wrong master secret, a flipped
//! ciphertext bit, or a flipped nonce bit all surface as
//! [`CoreError::DecryptionFailed`] — never as plausible wrong plaintext.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CoreError;
use crate::kdf;
use crate::memory::{MasterSecret, SecretBuffer};

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Derivation counter reserved for Encrypt mode. Regeneration counters
/// are capped strictly below it, so the Generate counter space can never
/// collide with the encryption key for the same service name.
pub const ENCRYPT_COUNTER: u64 = u64::MAX;

/// Minimum serialized length: nonce + empty ciphertext + tag.
const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// SealedPassword
// ---------------------------------------------------------------------------

/// Authenticated ciphertext container for one stored password.
///
/// Wire format: `nonce (12 bytes) || ciphertext (variable) || tag (16 bytes)`.
/// The nonce is random per encryption and must travel with the ciphertext;
/// the tag authenticates all three fields plus the service name.
#[must_use = "sealed password must be stored in the service record"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPassword {
    /// 96-bit random nonce, unique per encryption.
    pub nonce: [u8; NONCE_LEN],
    /// Encrypted password bytes (same length as the plaintext).
    pub ciphertext: Vec<u8>,
    /// 128-bit authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl SealedPassword {
    /// Serialize to wire format: `nonce || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = NONCE_LEN
            .saturating_add(self.ciphertext.len())
            .saturating_add(TAG_LEN);
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Deserialize from wire format.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordFormat`] if the input is shorter than a
    /// nonce and tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.len() < MIN_SEALED_LEN {
            return Err(CoreError::RecordFormat(format!(
                "sealed password too short: {} bytes (minimum {MIN_SEALED_LEN})",
                bytes.len()
            )));
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);

        let ct_end = bytes.len().saturating_sub(TAG_LEN);
        let ciphertext = bytes[NONCE_LEN..ct_end].to_vec();

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[ct_end..]);

        Ok(Self {
            nonce,
            ciphertext,
            tag,
        })
    }
}

// ---------------------------------------------------------------------------
// Encrypt / decrypt
// ---------------------------------------------------------------------------

/// Seal a caller-supplied password under the master secret.
///
/// The key is freshly derived at [`ENCRYPT_COUNTER`] and erased before
/// returning; the nonce comes from the OS CSPRNG; the service name is
/// bound in as additional authenticated data.
///
/// # Errors
///
/// Propagates [`CoreError::InvalidInput`] from derivation (blank secret
/// or service name) and returns [`CoreError::KeyDerivation`] /
/// [`CoreError::SecureMemory`] on internal failure.
pub fn encrypt(
    master_secret: &MasterSecret,
    service_name: &str,
    work_factor: u32,
    plaintext: &[u8],
) -> Result<SealedPassword, CoreError> {
    let key = kdf::derive(
        master_secret.expose(),
        service_name,
        ENCRYPT_COUNTER,
        work_factor,
        KEY_LEN,
    )?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    seal_with_nonce(key.expose(), nonce_bytes, service_name.as_bytes(), plaintext)
}

/// Seal with a caller-chosen nonce. Internal: the self-test replays
/// published vectors through this entry; everything else must use
/// [`encrypt`], which draws a fresh random nonce.
pub(crate) fn seal_with_nonce(
    key: &[u8],
    nonce_bytes: [u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<SealedPassword, CoreError> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CoreError::KeyDerivation("failed to create AES-256-GCM key".into()))?;
    let less_safe_key = aead::LessSafeKey::new(unbound);
    let nonce = aead::Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = plaintext.to_vec();
    let Ok(tag) = less_safe_key.seal_in_place_separate_tag(nonce, aead::Aad::from(aad), &mut in_out)
    else {
        in_out.zeroize();
        return Err(CoreError::KeyDerivation(
            "AES-256-GCM encryption failed".into(),
        ));
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(SealedPassword {
        nonce: nonce_bytes,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// Recover a stored password under the master secret.
///
/// # Errors
///
/// Returns [`CoreError::DecryptionFailed`] on any authentication failure:
/// wrong master secret, wrong service name, or tampered nonce, ciphertext,
/// or tag. Propagates derivation errors for unusable inputs.
pub fn decrypt(
    master_secret: &MasterSecret,
    service_name: &str,
    work_factor: u32,
    sealed: &SealedPassword,
) -> Result<SecretBuffer, CoreError> {
    let key = kdf::derive(
        master_secret.expose(),
        service_name,
        ENCRYPT_COUNTER,
        work_factor,
        KEY_LEN,
    )?;

    open(key.expose(), sealed, service_name.as_bytes())
}

pub(crate) fn open(
    key: &[u8],
    sealed: &SealedPassword,
    aad: &[u8],
) -> Result<SecretBuffer, CoreError> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CoreError::KeyDerivation("failed to create AES-256-GCM key".into()))?;
    let less_safe_key = aead::LessSafeKey::new(unbound);
    let nonce = aead::Nonce::assume_unique_for_key(sealed.nonce);

    let mut ct_tag = Vec::with_capacity(sealed.ciphertext.len().saturating_add(TAG_LEN));
    ct_tag.extend_from_slice(&sealed.ciphertext);
    ct_tag.extend_from_slice(&sealed.tag);

    let plaintext = less_safe_key
        .open_in_place(nonce, aead::Aad::from(aad), &mut ct_tag)
        .map_err(|_| CoreError::DecryptionFailed)?;

    let result = SecretBuffer::new(plaintext);
    ct_tag.zeroize();
    result
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
