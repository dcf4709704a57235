#![no_main]
use libfuzzer_sys::fuzz_target;
use xipher::{asx, KeyRegistry, PublicKey};

fuzz_target!(|data: &[u8]| {
    // Scoped registry so the interning tables do not grow across runs
    let registry = KeyRegistry::new();

    // Parsing arbitrary bytes must not panic
    if let Ok(key) = PublicKey::parse_in(&registry, data) {
        assert_eq!(&key.bytes()[..], data, "51-byte public key must re-encode exactly");
    }

    if let Ok(key) = asx::PublicKey::parse_in(&registry, data) {
        assert_eq!(key.bytes(), data, "Hybrid public key must re-encode exactly");
        assert_eq!(key.algorithm() as u8, data[0]);
    }
});
