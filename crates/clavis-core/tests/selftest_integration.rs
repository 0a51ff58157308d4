#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Startup self-test behavior through the public API.

use clavis_core::{generate_or_fetch, run_self_test, Constraints, MasterSecret, ServiceDescriptor};

#[test]
fn self_test_passes_and_opens_the_gate() {
    run_self_test().expect("self-test should pass on a conformant build");

    // A passing self-test leaves every operation available.
    let descriptor = ServiceDescriptor::new_generate("post-selftest.example", Constraints::default())
        .expect("descriptor should validate");
    let secret = MasterSecret::new(b"startup secret").expect("allocation should succeed");
    generate_or_fetch(&descriptor, &secret).expect("generation should succeed after a pass");
}

#[test]
fn self_test_is_repeatable() {
    run_self_test().expect("first run should pass");
    run_self_test().expect("second run should pass");
}
