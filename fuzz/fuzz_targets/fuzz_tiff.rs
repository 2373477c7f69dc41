#![no_main]
use libfuzzer_sys::fuzz_target;
use rawpump::parsing::TiffParser;

fuzz_target!(|data: &[u8]| {
    let Ok(tiff) = TiffParser::parse(data) else {
        return;
    };
    for ifd in &tiff.ifds {
        for entry in &ifd.entries {
            let _ = tiff.value_u32(entry, 0);
            let _ = tiff.string(entry);
        }
    }
});
