//! HTTP paths of the replica endpoints.

pub const SERVER_KEY: &str = "/v1/server-key";
pub const NONCE: &str = "/v1/nonce";
pub const TIMESTAMP: &str = "/v1/timestamp";
pub const PUBLIC_KEY_BY_ID: &str = "/v1/public-key";
pub const OPEN_ACCOUNT: &str = "/v1/open-account";
pub const SEND_AMOUNT: &str = "/v1/send-amount";
pub const CHECK_ACCOUNT: &str = "/v1/check-account";
pub const RECEIVE_AMOUNT: &str = "/v1/receive-amount";
pub const AUDIT: &str = "/v1/audit";
pub const WRITE_BACK_CHECK_ACCOUNT: &str = "/v1/write-back/check-account";
pub const WRITE_BACK_AUDIT: &str = "/v1/write-back/audit";
pub const HEALTH: &str = "/health";
pub const METRICS: &str = "/metrics";
