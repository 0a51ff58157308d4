#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Calibration through the public API, with real probe derivations.
//! Targets are kept tiny so the floor answers immediately.

use std::time::Duration;

use clavis_core::{calibrate, set_default_work_factor, CancelToken, CoreError, MIN_WORK_FACTOR};

#[test]
fn instant_target_returns_the_floor() {
    let token = CancelToken::new();
    let work_factor = calibrate(Duration::ZERO, &token).expect("calibrate should succeed");
    assert_eq!(work_factor, MIN_WORK_FACTOR);
}

#[test]
fn calibrated_result_is_a_valid_default() {
    let token = CancelToken::new();
    let work_factor = calibrate(Duration::ZERO, &token).expect("calibrate should succeed");
    set_default_work_factor(work_factor).expect("the calibrated factor should be installable");
}

#[test]
fn cancelled_token_aborts_calibration() {
    let token = CancelToken::new();
    token.cancel();
    let result = calibrate(Duration::from_millis(50), &token);
    assert!(matches!(result, Err(CoreError::Cancelled)));
}
