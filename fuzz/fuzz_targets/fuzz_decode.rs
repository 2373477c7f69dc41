#![no_main]
use libfuzzer_sys::fuzz_target;
use rawpump::{DecodeOptions, RawDecoder, TruncationPolicy};

fuzz_target!(|data: &[u8]| {
    let Ok(decoder) = RawDecoder::new(data) else {
        return;
    };
    for truncation in [TruncationPolicy::Tolerant, TruncationPolicy::Strict] {
        let options = DecodeOptions::default()
            .with_threads(2)
            .with_truncation(truncation);
        let _ = decoder.decode(&options);
    }
});
