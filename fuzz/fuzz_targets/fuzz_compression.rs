#![no_main]
use libfuzzer_sys::fuzz_target;
use xipher::compression::{compress, decompress};

fuzz_target!(|data: &[u8]| {
    // Compressed envelopes are never larger than stored ones
    let envelope = compress(data).expect("Compression must succeed");
    assert!(envelope.len() <= data.len() + 1);
    assert_eq!(decompress(&envelope).expect("Valid envelope must decompress"), data);

    // Decompressing arbitrary data must not panic
    let _ = decompress(data);
});
