#![no_main]

use libfuzzer_sys::fuzz_target;

use bftb_messages::{
    AuditResponse, CheckAccountResponse, SendAmountRequest, SignedRequest, SignedResponse,
    WriteBackAuditRequest,
};
use bftb_types::PublicKey;

fuzz_target!(|data: &[u8]| {
    // Request bodies as a replica receives them: parse, then run the
    // signature check on whatever parsed.
    if let Ok(request) = serde_json::from_slice::<SignedRequest<SendAmountRequest>>(data) {
        let _ = request.verify();
    }
    if let Ok(request) = serde_json::from_slice::<SignedRequest<WriteBackAuditRequest>>(data) {
        let _ = request.verify();
    }

    // Response bodies as a client receives them.
    let key = PublicKey([7; 32]);
    if let Ok(response) = serde_json::from_slice::<SignedResponse<CheckAccountResponse>>(data) {
        let _ = response.verify(&key);
    }
    if let Ok(response) = serde_json::from_slice::<SignedResponse<AuditResponse>>(data) {
        let _ = response.into_verified(&key);
    }
});
