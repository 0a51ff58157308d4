//! Constraint-satisfying password formatter.
//!
//! [`format`] renders a derived byte stream into a character string that
//! obeys a [`Constraints`] policy. Everything is deterministic: the same
//! bytes and policy always yield the same string, so a password can be
//! re-derived instead of stored.
//!
//! Mapping uses rejection sampling — a byte is accepted only below the
//! largest multiple of the alphabet size, so every alphabet position is
//! equally likely. Rejected bytes are discarded and the next byte of the
//! stream is drawn; the total number of draws is bounded by the stream
//! length, which [`draw_budget`] sizes from the requested length. A policy
//! deficit (too few digits or capitals) is repaired by a single bounded
//! substitution pass that also draws from the stream, never from fresh
//! randomness.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Output length when the policy does not pin one via `truncate`.
pub const DEFAULT_RENDER_LENGTH: usize = 20;

/// Hard cap on alphabet size; one stream byte indexes one position.
const MAX_ALPHABET: usize = 256;

const DIGITS: &[u8; 10] = b"0123456789";
const UPPERCASE: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Character policy for one service's generated password.
///
/// The base alphabet is lowercase plus digits; `case_sensitive` adds the
/// uppercase letters and `extra_symbols` extends the tail. When
/// `case_sensitive` is false the case dimension collapses: any letter
/// satisfies the `min_caps` count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraints {
    /// Include `A-Z` in the alphabet and count capitals literally.
    pub case_sensitive: bool,
    /// Minimum number of capital letters (any letter when the case
    /// dimension is collapsed).
    pub min_caps: u32,
    /// Minimum number of digit characters.
    pub min_digits: u32,
    /// Additional symbols appended to the alphabet, in sorted order.
    pub extra_symbols: BTreeSet<char>,
    /// Pin the output length to `max_length`.
    pub truncate: bool,
    /// Output length when `truncate` is set; ignored otherwise.
    pub max_length: u32,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            min_caps: 0,
            min_digits: 0,
            extra_symbols: BTreeSet::new(),
            truncate: false,
            max_length: 0,
        }
    }
}

impl Constraints {
    /// The length of the rendered password under this policy.
    #[must_use]
    pub fn render_length(&self) -> usize {
        if self.truncate {
            usize::try_from(self.max_length).unwrap_or(usize::MAX)
        } else {
            DEFAULT_RENDER_LENGTH
        }
    }

    /// Check that the policy can be satisfied at all.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::GenerationFailed`] if truncation pins a zero
    /// length, the required digits and capitals exceed the rendered
    /// length, or the alphabet outgrows one byte of index space. Callers
    /// are expected to reject such policies before registering a service;
    /// this is the backstop.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.truncate && self.max_length == 0 {
            return Err(CoreError::GenerationFailed(
                "policy truncates to zero length".into(),
            ));
        }
        let required = u64::from(self.min_caps).saturating_add(u64::from(self.min_digits));
        let length = u64::try_from(self.render_length()).unwrap_or(u64::MAX);
        if required > length {
            return Err(CoreError::GenerationFailed(format!(
                "policy requires {required} digits and capitals in {length} characters"
            )));
        }
        if self.alphabet().len() > MAX_ALPHABET {
            return Err(CoreError::GenerationFailed(format!(
                "alphabet exceeds {MAX_ALPHABET} symbols"
            )));
        }
        Ok(())
    }

    /// Build the alphabet: `a-z`, `0-9`, `A-Z` when case-sensitive, then
    /// the extra symbols in sorted order, minus duplicates.
    #[must_use]
    pub fn alphabet(&self) -> Vec<char> {
        let mut out: Vec<char> = ('a'..='z').collect();
        out.extend('0'..='9');
        if self.case_sensitive {
            out.extend('A'..='Z');
        }
        for &sym in &self.extra_symbols {
            if !out.contains(&sym) {
                out.push(sym);
            }
        }
        out
    }

    fn counts_as_cap(&self, ch: char) -> bool {
        if self.case_sensitive {
            ch.is_ascii_uppercase()
        } else {
            ch.is_ascii_alphabetic()
        }
    }
}

/// Number of derived bytes to request for one rendering of `constraints`.
///
/// Sized so that rejection sampling and the repair pass run out of bytes
/// only with negligible probability; exhaustion is still a clean
/// [`CoreError::GenerationFailed`], never a loop.
#[must_use]
pub fn draw_budget(constraints: &Constraints) -> usize {
    constraints
        .render_length()
        .saturating_mul(4)
        .saturating_add(64)
}

// ---------------------------------------------------------------------------
// Deterministic byte stream
// ---------------------------------------------------------------------------

struct ByteStream<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl ByteStream<'_> {
    fn next(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.pos).copied();
        if byte.is_some() {
            self.pos = self.pos.saturating_add(1);
        }
        byte
    }
}

/// Draw one uniform index in `0..n` by rejection sampling.
///
/// Returns `None` when the stream is exhausted. `n` is guarded to
/// `1..=256` by [`Constraints::validate`].
fn draw(stream: &mut ByteStream<'_>, n: usize) -> Option<usize> {
    debug_assert!(n >= 1 && n <= MAX_ALPHABET);
    #[allow(clippy::arithmetic_side_effects)]
    let limit = (MAX_ALPHABET / n) * n;
    loop {
        let byte = usize::from(stream.next()?);
        if byte < limit {
            #[allow(clippy::arithmetic_side_effects)]
            return Some(byte % n);
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Render `derived` into a string satisfying `constraints`.
///
/// # Errors
///
/// Returns [`CoreError::GenerationFailed`] for an infeasible policy or an
/// exhausted draw budget.
pub fn format(derived: &[u8], constraints: &Constraints) -> Result<String, CoreError> {
    constraints.validate()?;
    let alphabet = constraints.alphabet();
    let length = constraints.render_length();
    let mut stream = ByteStream {
        bytes: derived,
        pos: 0,
    };

    let mut chars: Vec<char> = Vec::with_capacity(length);
    for _ in 0..length {
        let idx = draw(&mut stream, alphabet.len()).ok_or_else(budget_exhausted)?;
        chars.push(alphabet[idx]);
    }

    repair(&mut chars, &mut stream, constraints)?;
    Ok(chars.into_iter().collect())
}

/// Substitute characters until the digit and capital minimums hold.
///
/// The earliest characters already satisfying each class are protected;
/// a deficit overwrites the earliest unprotected position with a
/// qualifying character drawn from the stream. Digits are repaired before
/// capitals. Bounded: each substitution protects its position, and
/// `validate` guarantees the minimums fit the length.
fn repair(
    chars: &mut [char],
    stream: &mut ByteStream<'_>,
    constraints: &Constraints,
) -> Result<(), CoreError> {
    let mut protected = vec![false; chars.len()];

    let mut digits_found: u32 = 0;
    for (i, &ch) in chars.iter().enumerate() {
        if digits_found >= constraints.min_digits {
            break;
        }
        if ch.is_ascii_digit() {
            protected[i] = true;
            digits_found = digits_found.saturating_add(1);
        }
    }

    let mut caps_found: u32 = 0;
    for (i, &ch) in chars.iter().enumerate() {
        if caps_found >= constraints.min_caps {
            break;
        }
        if !protected[i] && constraints.counts_as_cap(ch) {
            protected[i] = true;
            caps_found = caps_found.saturating_add(1);
        }
    }

    while digits_found < constraints.min_digits {
        let i = first_unprotected(&protected).ok_or_else(no_free_position)?;
        let idx = draw(stream, DIGITS.len()).ok_or_else(budget_exhausted)?;
        chars[i] = char::from(DIGITS[idx]);
        protected[i] = true;
        digits_found = digits_found.saturating_add(1);
    }

    let cap_class: &[u8] = if constraints.case_sensitive {
        UPPERCASE
    } else {
        LOWERCASE
    };
    while caps_found < constraints.min_caps {
        let i = first_unprotected(&protected).ok_or_else(no_free_position)?;
        let idx = draw(stream, cap_class.len()).ok_or_else(budget_exhausted)?;
        chars[i] = char::from(cap_class[idx]);
        protected[i] = true;
        caps_found = caps_found.saturating_add(1);
    }

    Ok(())
}

fn first_unprotected(protected: &[bool]) -> Option<usize> {
    protected.iter().position(|&p| !p)
}

fn budget_exhausted() -> CoreError {
    CoreError::GenerationFailed("deterministic draw budget exhausted".into())
}

fn no_free_position() -> CoreError {
    CoreError::GenerationFailed("no substitutable position left".into())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
