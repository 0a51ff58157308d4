//! Work-factor calibration against the current hardware.
//!
//! [`calibrate`] measures real [`crate::kdf::derive`] wall-clock latency
//! and returns the smallest work factor that meets a target, clamped to
//! the security floor. The search doubles from the floor until the target
//! is bracketed, then bisects; the total probe count is bounded, and a
//! target that cannot be bracketed fails cleanly instead of looping.
//!
//! Calibration blocks for several probe derivations, so callers run it
//! off the interactive thread and may hand in a [`CancelToken`] wired to
//! their dialog's close button.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CoreError;
use crate::kdf::{self, MIN_WORK_FACTOR};

/// Default acceptable derivation latency for the settings surface.
pub const DEFAULT_TARGET_LATENCY: Duration = Duration::from_millis(50);

/// Upper bound on probe derivations per calibration.
pub const MAX_PROBES: u32 = 24;

/// Work-factor ceiling for bracketing. A target latency not reached by
/// this cost on real hardware is pathological.
const BRACKET_CEILING: u32 = 1 << 16;

/// Probe inputs: deliberately long, as a worst-case scenario. Never a
/// real secret.
const PROBE_SECRET: &[u8] =
    b"calibration probe master secret, deliberately long: 0123456789abcdefghijklmnopqrstuvwxyz";
const PROBE_SERVICE: &str = "calibration-probe.invalid.deliberately-long-worst-case-service-name";

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag for a calibration in progress.
///
/// Cloned into the UI side; [`Self::cancel`] makes the next probe return
/// [`CoreError::Cancelled`]. No partial calibration state survives — the
/// core holds none.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// `true` once [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Calibration
// ---------------------------------------------------------------------------

/// Find the smallest work factor whose measured derivation latency is at
/// least `target_latency`, never below [`MIN_WORK_FACTOR`].
///
/// # Errors
///
/// Returns [`CoreError::CalibrationFailed`] if the target cannot be
/// bracketed within [`MAX_PROBES`] probes or the work-factor ceiling, and
/// [`CoreError::Cancelled`] if the token fires between probes. Probe
/// derivation errors propagate unchanged.
pub fn calibrate(target_latency: Duration, cancel: &CancelToken) -> Result<u32, CoreError> {
    search(target_latency, cancel, probe_latency)
}

/// One timed probe derivation at the given work factor.
fn probe_latency(work_factor: u32) -> Result<Duration, CoreError> {
    let started = Instant::now();
    let derived = kdf::derive(PROBE_SECRET, PROBE_SERVICE, 0, work_factor, 32)?;
    drop(derived);
    Ok(started.elapsed())
}

/// Bracket-and-bisect over an injectable prober.
fn search<F>(target: Duration, cancel: &CancelToken, mut probe: F) -> Result<u32, CoreError>
where
    F: FnMut(u32) -> Result<Duration, CoreError>,
{
    let mut probes_left: u32 = MAX_PROBES;

    if run_probe(&mut probe, cancel, &mut probes_left, MIN_WORK_FACTOR)? >= target {
        return Ok(MIN_WORK_FACTOR);
    }

    // Double until a probe meets the target.
    let mut lo = MIN_WORK_FACTOR;
    let mut hi = MIN_WORK_FACTOR;
    loop {
        hi = match hi.checked_mul(2) {
            Some(next) if next <= BRACKET_CEILING => next,
            _ => {
                return Err(CoreError::CalibrationFailed(format!(
                    "target latency not reached at work factor ceiling {BRACKET_CEILING}"
                )))
            }
        };
        if run_probe(&mut probe, cancel, &mut probes_left, hi)? >= target {
            break;
        }
        lo = hi;
    }

    // Bisect (lo, hi] down to the smallest qualifying factor.
    while lo.saturating_add(1) < hi {
        // lo < mid < hi holds throughout, so the midpoint math cannot wrap.
        #[allow(clippy::arithmetic_side_effects)]
        let mid = lo + (hi - lo) / 2;
        if run_probe(&mut probe, cancel, &mut probes_left, mid)? >= target {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    Ok(hi)
}

fn run_probe<F>(
    probe: &mut F,
    cancel: &CancelToken,
    probes_left: &mut u32,
    work_factor: u32,
) -> Result<Duration, CoreError>
where
    F: FnMut(u32) -> Result<Duration, CoreError>,
{
    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }
    let Some(left) = probes_left.checked_sub(1) else {
        return Err(CoreError::CalibrationFailed(format!(
            "did not converge within {MAX_PROBES} probes"
        )));
    };
    *probes_left = left;
    probe(work_factor)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Synthetic prober: one millisecond per work-factor unit, perfectly
    /// monotone, fully deterministic.
    fn linear_probe(work_factor: u32) -> Result<Duration, CoreError> {
        Ok(Duration::from_millis(u64::from(work_factor)))
    }

    #[test]
    fn fast_target_clamps_to_floor() {
        let token = CancelToken::new();
        let wf = search(Duration::ZERO, &token, linear_probe).expect("search should succeed");
        assert_eq!(wf, MIN_WORK_FACTOR);
    }

    #[test]
    fn finds_smallest_qualifying_work_factor() {
        let token = CancelToken::new();
        let wf = search(Duration::from_millis(10), &token, linear_probe)
            .expect("search should succeed");
        assert_eq!(wf, 10);
    }

    #[test]
    fn calibration_is_monotone_in_the_target() {
        let token = CancelToken::new();
        let targets = [1u64, 5, 10, 33, 100, 750];
        let mut previous = 0;
        for millis in targets {
            let wf = search(Duration::from_millis(millis), &token, linear_probe)
                .expect("search should succeed");
            assert!(wf >= previous, "target {millis}ms regressed to {wf}");
            previous = wf;
        }
    }

    #[test]
    fn unreachable_target_fails_at_the_ceiling() {
        let token = CancelToken::new();
        let err = search(Duration::from_secs(3600), &token, |_| {
            Ok(Duration::from_millis(1))
        })
        .expect_err("an unreachable target should not loop");
        assert!(matches!(err, CoreError::CalibrationFailed(_)));
    }

    #[test]
    fn cancelled_token_stops_before_probing() {
        let token = CancelToken::new();
        token.cancel();
        let err = search(Duration::from_millis(10), &token, linear_probe)
            .expect_err("a cancelled token should stop the search");
        assert!(matches!(err, CoreError::Cancelled));
    }

    #[test]
    fn cancellation_mid_search_is_observed() {
        let token = CancelToken::new();
        let observer = token.clone();
        let err = search(Duration::from_millis(100), &token, move |wf| {
            observer.cancel();
            linear_probe(wf)
        })
        .expect_err("cancellation between probes should stop the search");
        assert!(matches!(err, CoreError::Cancelled));
    }

    #[test]
    fn probe_errors_propagate() {
        let token = CancelToken::new();
        let err = search(Duration::from_millis(10), &token, |_| {
            Err(CoreError::KeyDerivation("probe exploded".into()))
        })
        .expect_err("probe failures should surface");
        assert!(matches!(err, CoreError::KeyDerivation(_)));
    }

    #[test]
    fn real_probe_meets_an_instant_target() {
        let token = CancelToken::new();
        let wf = calibrate(Duration::ZERO, &token).expect("calibrate should succeed");
        assert_eq!(wf, MIN_WORK_FACTOR);
    }
}
