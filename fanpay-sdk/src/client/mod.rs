//! HTTP clients for the fanpay APIs.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

mod admin;
mod service;

pub use admin::AdminClient;
pub use service::ServiceClient;

use reqwest::StatusCode;

use crate::objects::ErrorBody;
use crate::signature::SignatureError;

/// Errors produced by the SDK HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// HMAC signature could not be computed.
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// The server rejected the request with a structured error.
    #[error("api error: status {status}, code {}", .error.code)]
    Api { status: StatusCode, error: ErrorBody },

    /// The server returned a non-2xx status without a structured body.
    #[error("unexpected response: status {status}, body: {body}")]
    Unexpected { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if !status.is_success() {
        return Err(match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(error) => ClientError::Api { status, error },
            Err(_) => ClientError::Unexpected {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            },
        });
    }
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
