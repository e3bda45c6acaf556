#![no_main]

use libfuzzer_sys::fuzz_target;
use opus_convert::opus::OpusFile;

fuzz_target!(|data: &[u8]| {
    // Malformed input must surface as OpusError, never as a panic
    let Ok(file) = OpusFile::from_bytes(data.to_vec()) else {
        return;
    };

    for block in file.blocks() {
        if block.kind.is_spectrum() {
            let _ = file.read_block(block);
        } else {
            let _ = file.parameters_for(block);
        }
    }
});
