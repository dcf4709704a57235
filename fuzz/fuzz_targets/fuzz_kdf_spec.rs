#![no_main]
use libfuzzer_sys::fuzz_target;
use xipher::KdfSpec;

fuzz_target!(|data: &[u8]| {
    // Parse only, never derive: arbitrary costs would make each run slow
    if let Ok(spec) = KdfSpec::parse(data) {
        assert_eq!(&spec.bytes()[..], data);
        assert!(spec.iterations() > 0);
        assert!(spec.memory_mib() > 0);
        assert!(spec.threads() > 0);
    }
});
