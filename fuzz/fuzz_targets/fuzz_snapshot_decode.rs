#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // A corrupted snapshot file must be rejected, never trusted or panicked on.
    if let Ok(snapshot) = bftb_ledger::LedgerSnapshot::from_bytes(data) {
        let _ = snapshot.verify();
    }
});
