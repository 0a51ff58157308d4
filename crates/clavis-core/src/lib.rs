//! `clavis-core` — deterministic password derivation for CLAVIS.
//!
//! One memorized master secret, one derived password per registered
//! service, nothing secret ever persisted. This crate is the audit
//! target: zero network, zero async, zero UI dependencies. Window
//! presentation, clipboard handling, record storage, and startup wiring
//! live in the surrounding application.
//!
//! Call [`run_self_test`] once at startup before anything else; it
//! verifies the cryptographic arithmetic against published vectors and
//! gates derivation on success.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;

pub mod formatter;

pub mod cipher;

pub mod calibrate;

pub mod selftest;

pub mod record;

pub mod service;

pub use calibrate::{calibrate, CancelToken, DEFAULT_TARGET_LATENCY, MAX_PROBES};
pub use cipher::{SealedPassword, ENCRYPT_COUNTER, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use error::CoreError;
pub use formatter::{format, Constraints, DEFAULT_RENDER_LENGTH};
pub use kdf::{derive, service_salt, MEMORY_COST_KIB, MIN_WORK_FACTOR};
pub use memory::{disable_core_dumps, MasterSecret, Password, SecretBuffer};
pub use record::{decode, encode, FORMAT_VERSION, MAGIC};
pub use selftest::run_self_test;
pub use service::{
    default_work_factor, encrypt_password, generate_or_fetch, regenerate,
    set_default_work_factor, ServiceDescriptor, ServiceMode,
};
