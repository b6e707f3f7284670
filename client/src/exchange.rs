//! Which replica method serves which signed request.

use futures_util::future::BoxFuture;

use bftb_messages::{
    AccountRequest, AuditRequest, AuditResponse, CheckAccountRequest, CheckAccountResponse,
    OpenAccountRequest, OpenAccountResponse, ReceiveAmountRequest, ReceiveAmountResponse,
    ReplicaPayload, SendAmountRequest, SendAmountResponse, SignedRequest, SignedResponse,
    TimestampRequest, TimestampResponse, WriteBackAuditRequest, WriteBackCheckAccountRequest,
    WriteBackResponse,
};
use bftb_protocol::{CallError, ReplicaApi};

/// A signed request type and the call that submits it.
pub trait Exchange: AccountRequest {
    type Response: ReplicaPayload + PartialEq;

    fn submit<'a>(
        api: &'a dyn ReplicaApi,
        request: SignedRequest<Self>,
    ) -> BoxFuture<'a, Result<SignedResponse<Self::Response>, CallError>>;
}

macro_rules! exchange {
    ($request:ty => $response:ty, $method:ident) => {
        impl Exchange for $request {
            type Response = $response;

            fn submit<'a>(
                api: &'a dyn ReplicaApi,
                request: SignedRequest<Self>,
            ) -> BoxFuture<'a, Result<SignedResponse<Self::Response>, CallError>> {
                api.$method(request)
            }
        }
    };
}

exchange!(TimestampRequest => TimestampResponse, get_timestamp);
exchange!(OpenAccountRequest => OpenAccountResponse, open_account);
exchange!(SendAmountRequest => SendAmountResponse, send_amount);
exchange!(CheckAccountRequest => CheckAccountResponse, check_account);
exchange!(ReceiveAmountRequest => ReceiveAmountResponse, receive_amount);
exchange!(AuditRequest => AuditResponse, audit);
exchange!(WriteBackCheckAccountRequest => WriteBackResponse, write_back_check_account);
exchange!(WriteBackAuditRequest => WriteBackResponse, write_back_audit);
