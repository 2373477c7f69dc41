#![no_main]
use libfuzzer_sys::fuzz_target;
use rawpump::parsing::{DirectoryParser, ImageSectionParser, PropertyParser};

fuzz_target!(|data: &[u8]| {
    let Ok(directory) = DirectoryParser::parse(data) else {
        return;
    };
    for entry in directory.images() {
        let _ = ImageSectionParser::parse(data, entry);
    }
    for entry in directory.properties() {
        let _ = PropertyParser::parse(data, entry);
    }
});
