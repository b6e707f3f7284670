#![no_main]

use libfuzzer_sys::fuzz_target;

use bftb_work::{validate_work, Difficulty, WorkCounter};

fuzz_target!(|data: &[u8]| {
    // First 8 bytes: counter. Next byte: difficulty bits. Rest: payload.
    if data.len() >= 9 {
        let counter = u64::from_le_bytes([
            data[0], data[1], data[2], data[3],
            data[4], data[5], data[6], data[7],
        ]);
        let difficulty = match Difficulty::new(u32::from(data[8])) {
            Ok(difficulty) => difficulty,
            Err(_) => Difficulty::DEFAULT,
        };

        // This must never panic regardless of input
        let _ = validate_work(&data[9..], WorkCounter(counter), difficulty);
    }
});
