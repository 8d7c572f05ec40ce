//! Custom Axum extractors for request authentication.
//!
//! Provides:
//! - `SignedBody<T>`: verifies the `Fanpay-Signature` header against a signed JSON body
//!   (used by the Service API).
//! - `AdminAuth`: verifies the plaintext operator secret in the
//!   `Fanpay-Admin-Authorization` header (used by the Admin API).
//!
//! All cryptographic operations are delegated to [`fanpay_sdk::signature`]
//! and [`crate::config::runtime::OperatorCredentials`].

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use fanpay_core::access::Principal;
use fanpay_sdk::objects::ErrorCode;
use fanpay_sdk::signature::{
    ADMIN_AUTH_HEADER, SIGNATURE_HEADER, Signature, SignatureError, SignedObject,
};

use crate::api::error_response;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// SignedBody: Service API authentication via signed JSON body
// ---------------------------------------------------------------------------

/// An Axum extractor that verifies the `Fanpay-Signature` header and
/// deserializes + authenticates the JSON request body.
///
/// # Header format
///
/// ```text
/// Fanpay-Signature: {unix_timestamp}.{base64_signature}
/// ```
///
/// The signature is computed as `HMAC-SHA256("{timestamp}.{json_body}", service_secret)`.
pub struct SignedBody<T: Signature>(pub T);

/// Errors that can occur during signed-body verification.
#[derive(Debug, thiserror::Error)]
pub enum SignedBodyError {
    #[error("missing Fanpay-Signature header")]
    MissingHeader,
    #[error("invalid Fanpay-Signature header format")]
    InvalidHeader,
    #[error("invalid signature encoding")]
    InvalidBase64,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid JSON body: {0}")]
    JsonError(serde_json::Error),
    #[error("signature verification failed")]
    VerificationFailed,
}

impl From<SignatureError> for SignedBodyError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidFormat => Self::InvalidHeader,
            SignatureError::InvalidBase64 => Self::InvalidBase64,
            SignatureError::Json(e) => Self::JsonError(e),
            SignatureError::SignatureMismatch | SignatureError::Expired => Self::VerificationFailed,
        }
    }
}

impl IntoResponse for SignedBodyError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            SignedBodyError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "missing Fanpay-Signature header",
            ),
            SignedBodyError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                "invalid Fanpay-Signature header format",
            ),
            SignedBodyError::InvalidBase64 => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                "invalid signature encoding",
            ),
            SignedBodyError::BodyReadError => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                "failed to read request body",
            ),
            SignedBodyError::JsonError(_) => (
                StatusCode::BAD_REQUEST,
                ErrorCode::InvalidRequest,
                "invalid JSON body",
            ),
            SignedBodyError::VerificationFailed => (
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "signature verification failed",
            ),
        };
        error_response(status, code, message)
    }
}

impl<T: Signature + Send> FromRequest<AppState> for SignedBody<T> {
    type Rejection = SignedBodyError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = req
            .headers()
            .get(SIGNATURE_HEADER)
            .ok_or(SignedBodyError::MissingHeader)?
            .to_str()
            .map_err(|_| SignedBodyError::InvalidHeader)?
            .to_owned();

        let body_bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| SignedBodyError::BodyReadError)?;

        let json =
            String::from_utf8(body_bytes.to_vec()).map_err(|_| SignedBodyError::BodyReadError)?;

        let signed = SignedObject::<T>::from_header_and_body(&header_value, json)?;

        let service = state.config.service.read().await;
        let verified_body = signed.verify(service.secret_bytes())?;
        drop(service);

        Ok(SignedBody(verified_body))
    }
}

// ---------------------------------------------------------------------------
// AdminAuth: Admin API authentication via the operator secret
// ---------------------------------------------------------------------------

/// An Axum extractor that checks the `Fanpay-Admin-Authorization` header
/// against the argon2 hash from the config and yields the operator
/// principal.
pub struct AdminAuth(pub Principal);

/// Subject recorded in the operation log for console actions.
pub const OPERATOR_SUBJECT: &str = "operator";

#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("missing Fanpay-Admin-Authorization header")]
    MissingHeader,
    #[error("invalid admin credentials")]
    InvalidCredentials,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        error_response(StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, &message)
    }
}

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = AdminAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let secret = parts
            .headers
            .get(ADMIN_AUTH_HEADER)
            .ok_or(AdminAuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AdminAuthError::InvalidCredentials)?;

        let admin = state.config.admin.read().await;
        let verified = admin.verify(secret);
        drop(admin);

        if !verified {
            tracing::warn!("Rejected admin request with invalid credentials");
            return Err(AdminAuthError::InvalidCredentials);
        }
        Ok(AdminAuth(Principal::admin(OPERATOR_SUBJECT)))
    }
}
