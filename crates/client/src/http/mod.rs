//! `reqwest`-backed client implementations.

mod context;
mod erp;

pub use context::HttpContextStore;
pub use erp::{ErpConfig, HttpErpClient};

use crate::error::{ClientError, Target};

/// Maps an HTTP status to the facade taxonomy: 5xx and 429 are worth
/// retrying, everything else in the error range is a caller bug.
pub(crate) fn classify_status(
    target: Target,
    status: reqwest::StatusCode,
    body: &str,
) -> ClientError {
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ClientError::transient(target, format!("HTTP {status}: {body}"))
    } else {
        ClientError::permanent(target, format!("HTTP {status}: {body}"))
    }
}

/// Maps a transport-level `reqwest` error. Decode failures mean the payload
/// violated the contract and are permanent; everything else is network noise.
pub(crate) fn classify_transport(target: Target, err: reqwest::Error) -> ClientError {
    if err.is_decode() {
        ClientError::permanent(target, format!("malformed payload: {err}"))
    } else {
        ClientError::transient(target, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn server_errors_are_transient() {
        assert!(classify_status(Target::Erp, StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(
            classify_status(Target::Erp, StatusCode::SERVICE_UNAVAILABLE, "").is_transient()
        );
        assert!(classify_status(Target::Erp, StatusCode::TOO_MANY_REQUESTS, "").is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!classify_status(Target::Erp, StatusCode::NOT_FOUND, "").is_transient());
        assert!(!classify_status(Target::Erp, StatusCode::UNPROCESSABLE_ENTITY, "").is_transient());
        assert!(!classify_status(Target::ContextStore, StatusCode::UNAUTHORIZED, "").is_transient());
    }
}
