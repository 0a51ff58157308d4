//! Versioned binary encoding of service records.
//!
//! The storage collaborator owns where records live; this module owns
//! what their bytes mean, so that every core version can read every older
//! record.
//!
//! # Layout
//!
//! ```text
//! Magic (4 B) | Version (1 B) | Body Len (u32 LE) | Body JSON
//! ```
//!
//! The body is a JSON [`ServiceDescriptor`]. Missing fields take their
//! defaults and unknown fields are ignored, so the encoding is
//! forward-compatible in both directions: a version byte newer than this
//! core is the only hard rejection. Trailing bytes after the body are
//! tolerated for the storage layer's padding.

use crate::error::CoreError;
use crate::service::ServiceDescriptor;

/// Magic bytes identifying a clavis service record.
pub const MAGIC: &[u8; 4] = b"CLSR";

/// Current record format version.
pub const FORMAT_VERSION: u8 = 1;

const MAGIC_LEN: usize = 4;
const VERSION_LEN: usize = 1;
const LEN_PREFIX: usize = 4;
const HEADER_LEN: usize = MAGIC_LEN + VERSION_LEN + LEN_PREFIX;

/// Encode a descriptor into the record format.
///
/// # Errors
///
/// Returns [`CoreError::RecordFormat`] if the body cannot be serialized
/// and propagates validation errors for a malformed descriptor — an
/// invalid record is never written.
pub fn encode(descriptor: &ServiceDescriptor) -> Result<Vec<u8>, CoreError> {
    descriptor.validate()?;

    let body = serde_json::to_vec(descriptor)
        .map_err(|e| CoreError::RecordFormat(format!("record serialization failed: {e}")))?;
    let body_len: u32 = u32::try_from(body.len())
        .map_err(|_| CoreError::RecordFormat("record body too large for u32 length".into()))?;

    let mut out = Vec::with_capacity(HEADER_LEN.saturating_add(body.len()));
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&body_len.to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a record back into a validated descriptor.
///
/// # Errors
///
/// Returns [`CoreError::RecordFormat`] for bad magic, a version newer
/// than this core, a length that overruns the input, or an unparsable
/// body, and propagates validation errors for invariant violations.
pub fn decode(data: &[u8]) -> Result<ServiceDescriptor, CoreError> {
    if data.len() < HEADER_LEN {
        return Err(CoreError::RecordFormat(format!(
            "record too short: {} bytes (minimum {HEADER_LEN})",
            data.len()
        )));
    }

    if &data[..MAGIC_LEN] != MAGIC.as_slice() {
        return Err(CoreError::RecordFormat("invalid magic bytes".into()));
    }

    let version = data[MAGIC_LEN];
    if version > FORMAT_VERSION {
        return Err(CoreError::RecordFormat(format!(
            "record version {version} is newer than supported version {FORMAT_VERSION}"
        )));
    }

    let mut len_bytes = [0u8; LEN_PREFIX];
    len_bytes.copy_from_slice(&data[MAGIC_LEN.saturating_add(VERSION_LEN)..HEADER_LEN]);
    let body_len = usize::try_from(u32::from_le_bytes(len_bytes))
        .map_err(|_| CoreError::RecordFormat("record length does not fit".into()))?;

    let body_end = HEADER_LEN
        .checked_add(body_len)
        .ok_or_else(|| CoreError::RecordFormat("record length overflow".into()))?;
    if body_end > data.len() {
        return Err(CoreError::RecordFormat(format!(
            "record body extends beyond input: body_end={body_end}, len={}",
            data.len()
        )));
    }

    let descriptor: ServiceDescriptor = serde_json::from_slice(&data[HEADER_LEN..body_end])
        .map_err(|e| CoreError::RecordFormat(format!("invalid record body: {e}")))?;
    descriptor.validate()?;
    Ok(descriptor)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
