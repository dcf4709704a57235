#![no_main]
use libfuzzer_sys::fuzz_target;
use xipher::{keys, KeyRegistry};

fuzz_target!(|data: &[u8]| {
    if data.len() < 33 {
        return;
    }

    let registry = KeyRegistry::new();
    let key = match keys::parse_private_key_in(&registry, &data[..32]) {
        Ok(key) => key,
        Err(_) => return,
    };
    let plaintext = &data[32..];

    // Symmetric round-trip
    let ciphertext = key
        .encrypt_symmetric(plaintext, true)
        .expect("Symmetric encryption must succeed");
    let decrypted = key
        .decrypt(&ciphertext)
        .expect("Decryption of valid ciphertext must succeed");
    assert_eq!(decrypted, plaintext, "Round-trip mismatch");

    // Password-symmetric kinds are skipped: a forged spec could demand
    // arbitrary Argon2 costs
    if data[32] != 1 {
        // Decrypting arbitrary data must not panic
        let _ = key.decrypt(plaintext);
    }
});
