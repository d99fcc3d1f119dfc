pub mod device;
pub mod storage;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("OAuth request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected OAuth response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("Token storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Stored token is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Stored token is not valid UTF-8")]
    CorruptToken,

    #[error("No OAuth client id configured (set github.client_id or PR_HELPER_CLIENT_ID)")]
    MissingClientId,

    #[error("Authorization was denied by the user")]
    Denied,

    #[error("Device code expired before authorization completed")]
    Expired,

    #[error("OAuth error: {0}")]
    Provider(String),
}
