#![no_main]

use libfuzzer_sys::fuzz_target;
use opus_convert::export::{read_mat, read_npy};

fuzz_target!(|data: &[u8]| {
    let _ = read_npy(&mut &data[..]);
    let _ = read_mat(&mut &data[..]);
});
