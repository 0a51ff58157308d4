#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Must never panic on arbitrary input
    if let Ok(sealed) = clavis_core::cipher::SealedPassword::from_bytes(data) {
        let _ = sealed.to_bytes();
    }
});
